//! Stratified spherical Earth and atmosphere density model.
//!
//! Fifteen shells, indexed 0..14: shells 0-8 are the solid Earth (Preliminary Earth Model, PEM,
//! analytic polynomials in `x = r / EARTH_RADIUS`), shell 9 is the ocean (also PEM, constant
//! density), shells 10-13 are four exponential US-Standard atmosphere layers, and shell 14 is
//! outer space. Each shell's density function also returns an advisory maximum step, consumed by
//! the charged-lepton transport engine to cap its step size.

use crate::constants::EARTH_RADIUS;

/// Number of shells in the model.
pub const SHELL_COUNT: usize = 15;

/// Shell index of the ocean (can be replaced by rock with `--pem-no-sea`).
pub const SEA_SHELL: usize = 9;

/// Shell index of the uppermost solid-rock PEM layer, used to replace the ocean.
pub const ROCK_SHELL: usize = 8;

/// First atmospheric shell index.
pub const ATMOSPHERE_START: usize = 10;

/// Shell index denoting "outside the simulation domain".
pub const OUTSIDE: i32 = -1;

type DensityFn = fn(f64) -> (f64, f64);

/// One radial shell: an outer boundary, a representative material, and a density law.
#[derive(Clone, Copy)]
pub struct Shell {
    r_out: f64,
    z: f64,
    a: f64,
    density_fn: DensityFn,
}

impl Shell {
    /// Outer radius of this shell, in m.
    #[must_use]
    pub const fn r_out(&self) -> f64 {
        self.r_out
    }

    /// Charge number of the shell's representative material.
    #[must_use]
    pub const fn z(&self) -> f64 {
        self.z
    }

    /// Mass number of the shell's representative material.
    #[must_use]
    pub const fn a(&self) -> f64 {
        self.a
    }

    /// Evaluates `(density [kg/m^3], advisory max step [m])` at radius `r`.
    #[must_use]
    pub fn density(&self, r: f64) -> (f64, f64) {
        (self.density_fn)(r)
    }
}

fn pem0(r: f64) -> (f64, f64) {
    let x = r / EARTH_RADIUS;
    let a2 = -8.8381e+03;
    let density = 13.0885e+03 + a2 * x * x;
    let xg = if x <= 5e-02 { 5e-02 } else { x };
    (density, 0.01 * EARTH_RADIUS / (2.0 * a2 * xg).abs())
}

fn pem1(r: f64) -> (f64, f64) {
    let x = r / EARTH_RADIUS;
    let a = 1.2638e+03;
    let density = 12.581_55e+03 + x * (-a + x * (-3.6426e+03 - x * 5.5281e+03));
    (density, 0.01 * EARTH_RADIUS / a)
}

fn pem2(r: f64) -> (f64, f64) {
    let x = r / EARTH_RADIUS;
    let a = 6.4761e+03;
    let density = 7.9565e+03 + x * (-a + x * (2.5283e+03 - x * 3.0807e+03));
    (density, 0.01 * EARTH_RADIUS / a)
}

fn pem3(r: f64) -> (f64, f64) {
    let x = r / EARTH_RADIUS;
    let a = 1.4836e+03;
    (5.3197e+03 - a * x, 0.01 * EARTH_RADIUS / a)
}

fn pem4(r: f64) -> (f64, f64) {
    let x = r / EARTH_RADIUS;
    let a = 8.0298e+03;
    (11.2494e+03 - a * x, 0.01 * EARTH_RADIUS / a)
}

fn pem5(r: f64) -> (f64, f64) {
    let x = r / EARTH_RADIUS;
    let a = 3.8045e+03;
    (7.1089e+03 - a * x, 0.01 * EARTH_RADIUS / a)
}

fn pem6(r: f64) -> (f64, f64) {
    let x = r / EARTH_RADIUS;
    let a = 0.6924e+03;
    (2.691e+03 + a * x, 0.01 * EARTH_RADIUS / a)
}

fn pem7(_r: f64) -> (f64, f64) {
    (2.9e+03, 0.0)
}

fn pem8(_r: f64) -> (f64, f64) {
    (2.6e+03, 0.0)
}

fn pem9(_r: f64) -> (f64, f64) {
    (1.02e+03, 0.0)
}

macro_rules! uss_model {
    ($name:ident, $b:expr, $c:expr) => {
        fn $name(r: f64) -> (f64, f64) {
            let b: f64 = $b;
            let c: f64 = $c;
            (b / c * (-(r - EARTH_RADIUS) / c).exp(), 0.01 * c)
        }
    };
}

uss_model!(uss0, 12_226.562, 9_941.8638);
uss_model!(uss1, 11_449.069, 8_781.5355);
uss_model!(uss2, 13_055.948, 6_361.4304);
uss_model!(uss3, 5_401.778, 7_721.7016);

fn space0(_r: f64) -> (f64, f64) {
    // ~10^6 hydrogen atoms per m^3.
    (1.0e-21, 0.0)
}

const ZR: f64 = 13.0;
const AR: f64 = 26.0;
const ZW: f64 = 3.333_34;
const AW: f64 = 6.005_57;
const ZA: f64 = 7.261_99;
const AA: f64 = 14.5477;

/// The stratified Earth/atmosphere/space density model.
#[derive(Clone)]
pub struct EarthModel {
    shells: [Shell; SHELL_COUNT],
}

impl EarthModel {
    /// Builds the default model (ocean present at shell 9).
    #[must_use]
    pub fn new() -> Self {
        Self {
            shells: [
                Shell { r_out: 1_221.5e+03, z: ZR, a: AR, density_fn: pem0 },
                Shell { r_out: 3_480.0e+03, z: ZR, a: AR, density_fn: pem1 },
                Shell { r_out: 5_701.0e+03, z: ZR, a: AR, density_fn: pem2 },
                Shell { r_out: 5_771.0e+03, z: ZR, a: AR, density_fn: pem3 },
                Shell { r_out: 5_971.0e+03, z: ZR, a: AR, density_fn: pem4 },
                Shell { r_out: 6_151.0e+03, z: ZR, a: AR, density_fn: pem5 },
                Shell { r_out: 6_346.6e+03, z: ZR, a: AR, density_fn: pem6 },
                Shell { r_out: 6_356.0e+03, z: ZR, a: AR, density_fn: pem7 },
                Shell { r_out: 6_368.0e+03, z: ZR, a: AR, density_fn: pem8 },
                Shell { r_out: EARTH_RADIUS, z: ZW, a: AW, density_fn: pem9 },
                Shell { r_out: EARTH_RADIUS + 4.0e+03, z: ZA, a: AA, density_fn: uss0 },
                Shell { r_out: EARTH_RADIUS + 1.0e+04, z: ZA, a: AA, density_fn: uss1 },
                Shell { r_out: EARTH_RADIUS + 4.0e+04, z: ZA, a: AA, density_fn: uss2 },
                Shell { r_out: EARTH_RADIUS + 1.0e+05, z: ZA, a: AA, density_fn: uss3 },
                Shell {
                    r_out: crate::constants::GEO_ORBIT,
                    z: ZA,
                    a: AA,
                    density_fn: space0,
                },
            ],
        }
    }

    /// Replaces the ocean (shell 9) by a copy of the uppermost rock layer (shell 8), as the
    /// `--pem-no-sea` flag requests (spec.md section 6 / E5).
    #[must_use]
    pub fn with_pem_no_sea(mut self, enabled: bool) -> Self {
        if enabled {
            let rock = self.shells[ROCK_SHELL];
            self.shells[SEA_SHELL].z = rock.z;
            self.shells[SEA_SHELL].a = rock.a;
            self.shells[SEA_SHELL].density_fn = rock.density_fn;
        }
        self
    }

    /// Number of shells.
    #[must_use]
    pub const fn len(&self) -> usize {
        SHELL_COUNT
    }

    /// Whether the model has any shells (always `true`; kept for clippy's `len_without_is_empty`).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns shell `index`. Panics if `index >= SHELL_COUNT`.
    #[must_use]
    pub fn shell(&self, index: usize) -> &Shell {
        &self.shells[index]
    }

    /// Outer boundary radius of shell `index`.
    #[must_use]
    pub fn r_out(&self, index: usize) -> f64 {
        self.shells[index].r_out
    }

    /// The sentinel outer radius beyond which the domain ends (`2 * GEO_ORBIT`), used by the
    /// geometry oracle as the outer boundary of the outermost shell.
    #[must_use]
    pub const fn outer_sentinel(&self) -> f64 {
        crate::constants::DOMAIN_RADIUS
    }

    /// Evaluates `(density, advisory max step)` for shell `index` at radius `r`.
    #[must_use]
    pub fn density(&self, index: usize, r: f64) -> (f64, f64) {
        self.shells[index].density(r)
    }
}

impl Default for EarthModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn shells_are_strictly_increasing() {
        let model = EarthModel::new();
        for i in 1..SHELL_COUNT {
            assert!(model.r_out(i - 1) < model.r_out(i));
        }
    }

    #[test]
    fn density_is_positive_everywhere() {
        let model = EarthModel::new();
        let mut r_in = 0.0;
        for i in 0..SHELL_COUNT {
            let r_out = model.r_out(i);
            let r_mid = 0.5 * (r_in + r_out);
            let (density, _) = model.density(i, r_mid);
            assert!(density > 0.0, "shell {i} has non-positive density at {r_mid}");
            r_in = r_out;
        }
    }

    #[test]
    fn pem_no_sea_replaces_shell_with_rock() {
        let model = EarthModel::new().with_pem_no_sea(true);
        let rock = model.shell(ROCK_SHELL);
        let sea = model.shell(SEA_SHELL);
        assert_approx_eq!(f64, rock.z(), sea.z());
        assert_approx_eq!(f64, rock.a(), sea.a());
        // the sea's own outer radius is unchanged, only its material/density law is replaced
        assert_approx_eq!(f64, sea.r_out(), EARTH_RADIUS);
    }

    #[test]
    fn default_sea_differs_from_rock() {
        let model = EarthModel::new();
        let (sea_density, _) = model.density(SEA_SHELL, EARTH_RADIUS - 1.0);
        let (rock_density, _) = model.density(ROCK_SHELL, EARTH_RADIUS - 1.0);
        assert!((sea_density - rock_density).abs() > 1.0);
    }
}
