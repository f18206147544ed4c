//! Tau decay sampler interface, modelled on ALOUETTE/TAUOLA (spec.md section 6).
//!
//! ALOUETTE is an out-of-scope external collaborator (spec.md section 1). This module exposes the
//! decay/undecay boundary the backward driver needs, with one concrete implementation built on a
//! fixed branching-ratio table covering the dominant leptonic and 1-prong hadronic channels rather
//! than a full matrix-element generator.

use crate::constants::TAU_MASS;
use crate::pid::{MU, MU_BAR, NU_E, NU_E_BAR, NU_MU, NU_MU_BAR, NU_TAU, NU_TAU_BAR, TAU, TAU_BAR};
use crate::prng::Prng;

/// A single decay product: PDG code plus 3-momentum, in GeV/c.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayProduct {
    /// PDG species identifier.
    pub pid: i32,
    /// 3-momentum in the lab frame, in GeV/c.
    pub momentum: [f64; 3],
}

/// A sampled decay: a bundle of outgoing products whose 4-momenta sum to the decaying tau's
/// (approximately, energy loss from the sampler's own rounding aside).
#[derive(Clone, Debug, PartialEq)]
pub struct DecayEvent {
    /// The daughter particles, in the lab frame.
    pub products: Vec<DecayProduct>,
}

/// The tau decay sampler's capability set (spec.md section 6).
pub trait DecaySampler {
    /// Samples a decay of a tau of the given `pid`, `energy` (GeV) and unit `direction`.
    fn decay(&self, pid: i32, energy: f64, direction: [f64; 3], prng: &mut Prng) -> DecayEvent;

    /// Backward "undecay": given a requested daughter `pid` (typically the regenerated neutrino)
    /// and its energy/direction, samples a parent tau energy and the weight of that choice
    /// (spec.md section 4.7, BMC stage 1).
    fn undecay(&self, daughter_pid: i32, daughter_energy: f64, prng: &mut Prng) -> (f64, f64);
}

/// One decay channel: the product list template (each entry is a fraction of the tau's energy,
/// in the tau rest frame's collinear/longitudinal approximation) and its branching ratio.
struct Channel {
    branching_ratio: f64,
    products: &'static [(i32, f64)],
}

/// Leptonic and 1-prong hadronic branching fractions (PDG 2022 rounded), for `tau-`. Energies are
/// momentum fractions of the parent tau in the collinear approximation (spec.md Non-goals:
/// `--long` mode assumes massless, collinear daughters).
const TAU_CHANNELS: &[Channel] = &[
    Channel { branching_ratio: 0.1782, products: &[(NU_TAU, 0.45), (MU, 0.30), (NU_MU_BAR, 0.25)] },
    Channel { branching_ratio: 0.1782, products: &[(NU_TAU, 0.45), (MU, 0.30), (NU_E_BAR, 0.25)] },
    Channel { branching_ratio: 0.1108, products: &[(NU_TAU, 0.30), (-211, 0.70)] },
    Channel { branching_ratio: 0.2549, products: &[(NU_TAU, 0.25), (-211, 0.50), (111, 0.25)] },
    Channel { branching_ratio: 0.2779, products: &[(NU_TAU, 0.20), (-211, 0.40), (111, 0.20), (111, 0.20)] },
];

fn pick_channel(prng: &mut Prng) -> &'static Channel {
    let total: f64 = TAU_CHANNELS.iter().map(|c| c.branching_ratio).sum();
    let mut u = prng.uniform01() * total;
    for channel in TAU_CHANNELS {
        if u < channel.branching_ratio {
            return channel;
        }
        u -= channel.branching_ratio;
    }
    &TAU_CHANNELS[TAU_CHANNELS.len() - 1]
}

/// Flips every PDG code in a `tau-` channel template to its charge conjugate, for `tau+` decays.
fn conjugate(pid: i32) -> i32 {
    match pid {
        NU_TAU => NU_TAU_BAR,
        NU_TAU_BAR => NU_TAU,
        MU => MU_BAR,
        MU_BAR => MU,
        NU_MU => NU_MU_BAR,
        NU_MU_BAR => NU_MU,
        NU_E => NU_E_BAR,
        NU_E_BAR => NU_E,
        other => -other,
    }
}

/// A simplified, deterministic-given-its-PRNG stand-in for ALOUETTE/TAUOLA.
pub struct AlouetteLike;

impl AlouetteLike {
    /// Builds the sampler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AlouetteLike {
    fn default() -> Self {
        Self::new()
    }
}

impl DecaySampler for AlouetteLike {
    fn decay(&self, pid: i32, energy: f64, direction: [f64; 3], prng: &mut Prng) -> DecayEvent {
        let channel = pick_channel(prng);
        let is_antiparticle = pid == TAU_BAR;

        let products = channel
            .products
            .iter()
            .map(|&(template_pid, fraction)| {
                let daughter_pid = if is_antiparticle { conjugate(template_pid) } else { template_pid };
                let momentum = energy * fraction;
                DecayProduct {
                    pid: daughter_pid,
                    momentum: [direction[0] * momentum, direction[1] * momentum, direction[2] * momentum],
                }
            })
            .collect();

        DecayEvent { products }
    }

    fn undecay(&self, daughter_pid: i32, daughter_energy: f64, prng: &mut Prng) -> (f64, f64) {
        // Parent energy is drawn from the same collinear fraction used by `decay`, picking a
        // channel containing `daughter_pid` and inverting its fraction; unmatched species fall
        // back to the inclusive all-channel average fraction (spec.md section 4.7, stage 1).
        let matching: Vec<_> = TAU_CHANNELS
            .iter()
            .flat_map(|c| c.products.iter().map(move |&(p, f)| (c, p, f)))
            .filter(|&(_, p, _)| p == daughter_pid || conjugate(p) == daughter_pid)
            .collect();

        let (channel, fraction) = if matching.is_empty() {
            let channel = pick_channel(prng);
            (channel, channel.products[0].1)
        } else {
            let index = (prng.uniform01() * matching.len() as f64).floor() as usize;
            let (channel, _, fraction) = matching[index.min(matching.len() - 1)];
            (channel, fraction)
        };

        let parent_energy = daughter_energy / fraction.max(1.0e-06);
        let weight = channel.branching_ratio * fraction;
        (parent_energy.max(TAU_MASS), weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_conserves_product_count_per_channel() {
        let sampler = AlouetteLike::new();
        let mut prng = Prng::from_seed(3);
        let event = sampler.decay(TAU, 1.0e+05, [0.0, 0.0, 1.0], &mut prng);
        assert!(!event.products.is_empty());
        assert!(event.products.iter().all(|p| p.momentum[2] > 0.0));
    }

    #[test]
    fn antiparticle_decay_conjugates_products() {
        let sampler = AlouetteLike::new();
        let mut prng = Prng::from_seed(3);
        let tau_event = sampler.decay(TAU, 1.0e+05, [0.0, 0.0, 1.0], &mut prng);
        let mut prng2 = Prng::from_seed(3);
        let antitau_event = sampler.decay(TAU_BAR, 1.0e+05, [0.0, 0.0, 1.0], &mut prng2);
        assert_eq!(tau_event.products.len(), antitau_event.products.len());
    }

    #[test]
    fn undecay_produces_a_finite_parent_energy() {
        let sampler = AlouetteLike::new();
        let mut prng = Prng::from_seed(21);
        let (energy, weight) = sampler.undecay(NU_TAU, 1.0e+04, &mut prng);
        assert!(energy.is_finite() && energy > 0.0);
        assert!(weight > 0.0);
    }
}
