//! Validated sampler configuration: energy, angle, altitude and per-species weights that define
//! the source/target phase space.

use crate::constants::{MIN_SAMPLER_ENERGY, MIN_SAMPLER_ENERGY_MAX};
use crate::pid::{Species, ALL_SPECIES};
use crate::prng::Prng;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Energy, angle, altitude and per-species weight ranges defining the sampled phase space.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sampler {
    /// Altitude range `[z0, z1]`, in m, `>= 0`.
    pub altitude: [f64; 2],
    /// `cos(theta)` range, a subset of `[0, 1]`.
    pub cos_theta: [f64; 2],
    /// Elevation range, in degrees, a subset of `[-90, 90]`.
    pub elevation: [f64; 2],
    /// Energy range, in GeV.
    pub energy: [f64; 2],
    /// Per-species weights, in the fixed order of [`crate::pid::ALL_SPECIES`].
    pub weights: [f64; 8],
}

impl Sampler {
    /// Checks every phase-space validation rule. Returns the first violation found.
    ///
    /// # Errors
    ///
    /// Returns [`Error::General`] describing the first rule that does not hold.
    pub fn validate(&self) -> Result<()> {
        if !(self.altitude[0] >= 0.0 && self.altitude[0] <= self.altitude[1]) {
            return Err(Error::General(format!(
                "invalid altitude range [{}, {}]: expected 0 <= z0 <= z1",
                self.altitude[0], self.altitude[1]
            )));
        }
        if !(0.0 <= self.cos_theta[0] && self.cos_theta[0] <= self.cos_theta[1] && self.cos_theta[1] <= 1.0) {
            return Err(Error::General(format!(
                "invalid cos(theta) range [{}, {}]: expected 0 <= c0 <= c1 <= 1",
                self.cos_theta[0], self.cos_theta[1]
            )));
        }
        if !(-90.0 <= self.elevation[0] && self.elevation[0] <= self.elevation[1] && self.elevation[1] <= 90.0) {
            return Err(Error::General(format!(
                "invalid elevation range [{}, {}]: expected -90 <= e0 <= e1 <= 90",
                self.elevation[0], self.elevation[1]
            )));
        }
        if self.energy[0] < MIN_SAMPLER_ENERGY {
            return Err(Error::General(format!(
                "energy lower bound {} GeV is below the minimum of {MIN_SAMPLER_ENERGY} GeV",
                self.energy[0]
            )));
        }
        if self.energy[1] < MIN_SAMPLER_ENERGY_MAX {
            return Err(Error::General(format!(
                "energy upper bound {} GeV is below the required minimum of {MIN_SAMPLER_ENERGY_MAX} GeV",
                self.energy[1]
            )));
        }
        if self.energy[0] > self.energy[1] {
            return Err(Error::General(format!(
                "invalid energy range [{}, {}]: expected e0 <= e1",
                self.energy[0], self.energy[1]
            )));
        }
        if self.weights.iter().all(|&w| w == 0.0) {
            return Err(Error::General("all species weights are zero".to_string()));
        }
        Ok(())
    }

    /// A stable hash of the sampler's configuration, captured on validation.
    /// Running a context against a sampler whose current hash differs from the one captured at
    /// validation time is a hard error.
    #[must_use]
    pub fn hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for bound in self.altitude.iter().chain(&self.cos_theta).chain(&self.elevation).chain(&self.energy) {
            bound.to_bits().hash(&mut hasher);
        }
        for weight in &self.weights {
            weight.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// The weight assigned to `species`.
    #[must_use]
    pub fn weight_of(&self, species: Species) -> f64 {
        let index = ALL_SPECIES.iter().position(|&s| s == species).unwrap();
        self.weights[index]
    }

    /// Sum of the 6 neutrino species' weights.
    #[must_use]
    pub fn neutrino_weight(&self) -> f64 {
        ALL_SPECIES
            .iter()
            .zip(&self.weights)
            .filter(|(species, _)| species.is_neutrino())
            .map(|(_, &w)| w)
            .sum()
    }

    /// Sum of all 8 species' weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Samples a value uniformly in `[x[0], x[1]]`, except in grammage-scan mode where it returns
    /// the deterministic grid point `x[0] + (x[1] - x[0]) * i / (n - 1)`.
    pub fn linear(x: [f64; 2], i: usize, n: usize, grammage_scan: bool, prng: &mut Prng) -> f64 {
        let u = if grammage_scan {
            if n <= 1 {
                0.0
            } else {
                i as f64 / (n - 1) as f64
            }
        } else {
            prng.uniform01()
        };
        x[0] + (x[1] - x[0]) * u
    }

    /// Samples a value log-uniformly when `x[0] > 0` or `x[1] < 0`, linearly otherwise, folding
    /// the sampling Jacobian into the returned weight factor.
    pub fn log_or_linear(x: [f64; 2], prng: &mut Prng) -> (f64, f64) {
        if x[0] > 0.0 || x[1] < 0.0 {
            let r = (x[1] / x[0]).ln();
            let u = prng.uniform01();
            let value = x[0] * (r * u).exp();
            (value, r * value)
        } else {
            let u = prng.uniform01();
            let value = x[0] + (x[1] - x[0]) * u;
            (value, x[1] - x[0])
        }
    }

    /// Samples the primary energy from `self.energy`. In analog mode this draws directly from
    /// the physical `1/E^2` spectrum with unit weight; otherwise it draws log-uniformly and folds
    /// the `1/E^2` re-weighting into the returned weight factor.
    pub fn sample_energy(&self, analog: bool, prng: &mut Prng) -> (f64, f64) {
        let [e_min, e_max] = self.energy;
        if analog {
            let ei0 = 1.0 / e_min;
            let ei1 = 1.0 / e_max;
            let u = prng.uniform01();
            let energy = 1.0 / ei0.mul_add(1.0, -u * (ei0 - ei1));
            (energy, 1.0)
        } else {
            let r = (e_max / e_min).ln();
            let u = prng.uniform01();
            let energy = e_min * (r * u).exp();
            let weight = r * e_max * e_min / ((e_max - e_min) * energy);
            (energy, weight)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_sampler() -> Sampler {
        Sampler {
            altitude: [0.0, 0.0],
            cos_theta: [0.15, 0.25],
            elevation: [0.0, 0.0],
            energy: [1.0e+07, 1.0e+12],
            weights: [0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn valid_sampler_passes() {
        assert!(valid_sampler().validate().is_ok());
    }

    #[test]
    fn low_energy_is_rejected() {
        let mut sampler = valid_sampler();
        sampler.energy[0] = 50.0;
        assert!(sampler.validate().is_err());
    }

    #[test]
    fn energy_upper_bound_too_low_is_rejected() {
        let mut sampler = valid_sampler();
        sampler.energy[1] = 1.0e+06;
        assert!(sampler.validate().is_err());
    }

    #[test]
    fn all_zero_weights_is_rejected() {
        let mut sampler = valid_sampler();
        sampler.weights = [0.0; 8];
        assert!(sampler.validate().is_err());
    }

    #[test]
    fn cos_theta_out_of_range_is_rejected() {
        let mut sampler = valid_sampler();
        sampler.cos_theta = [0.5, 0.2];
        assert!(sampler.validate().is_err());
    }

    #[test]
    fn weight_sums_match_total() {
        let sampler = valid_sampler();
        let sum: f64 = sampler.weights.iter().sum();
        assert_eq!(sampler.total_weight(), sum);
    }

    #[test]
    fn hash_is_stable_for_unchanged_configuration() {
        let sampler = valid_sampler();
        assert_eq!(sampler.hash(), sampler.hash());
        assert_eq!(sampler.hash(), sampler.clone().hash());
    }

    #[test]
    fn hash_changes_with_configuration() {
        let mut sampler = valid_sampler();
        let before = sampler.hash();
        sampler.energy[1] *= 2.0;
        assert_ne!(before, sampler.hash());
    }

    #[test]
    fn grammage_scan_linear_is_deterministic_grid() {
        let mut prng = Prng::from_seed(7);
        let x = [0.15, 0.25];
        let values: Vec<_> = (0..3).map(|i| Sampler::linear(x, i, 3, true, &mut prng)).collect();
        assert!((values[0] - 0.15).abs() < 1.0e-12);
        assert!((values[1] - 0.20).abs() < 1.0e-12);
        assert!((values[2] - 0.25).abs() < 1.0e-12);
    }
}
