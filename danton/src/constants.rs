//! Physical and numerical constants shared across the crate.

/// The (mean) spherical Earth radius, in m.
pub const EARTH_RADIUS: f64 = 6_371.0e+03;

/// The radius of the geostationary orbit, in m.
///
/// Geometry queries beyond `2 * GEO_ORBIT` place the particle outside the simulation domain.
pub const GEO_ORBIT: f64 = 42_164.0e+03;

/// Outer radius of the simulation domain: particles past this are considered escaped.
pub const DOMAIN_RADIUS: f64 = 2.0 * GEO_ORBIT;

/// Minimum step length returned by the geometry oracle, in m.
pub const MIN_STEP: f64 = 1.0e-03;

/// Tau mass, in GeV / c^2 (PDG value).
pub const TAU_MASS: f64 = 1.77686;

/// Tau proper lifetime times c, in m (`c * tau_0`).
pub const TAU_CTAU: f64 = 87.03e-06;

/// Lower energy bound accepted by the sampler, in GeV.
pub const MIN_SAMPLER_ENERGY: f64 = 1.0e+02;

/// Lower bound required for the sampler's upper energy edge, in GeV.
pub const MIN_SAMPLER_ENERGY_MAX: f64 = 1.0e+12;

/// Default lower energy cut below which all particles are killed, in GeV.
pub const DEFAULT_ENERGY_CUT: f64 = 1.0e+03;

/// Backward Monte-Carlo mean free path `lambda_0`, in kg/m^2.
pub const BMC_LAMBDA_0: f64 = 3.0e+07;

/// Backward Monte-Carlo decay-biasing probability `p_1`.
pub const BMC_DECAY_BIAS_PROBABILITY: f64 = 0.1;

/// Backward Monte-Carlo undecay importance parameter.
pub const BMC_DECAY_BIAS: f64 = 6.0;

/// Maximum number of retries for the decay/undecay samplers before an event is discarded.
pub const MAX_DECAY_RETRIES: u32 = 20;

/// Avogadro's number, in mol^-1.
pub const AVOGADRO: f64 = 6.022_140_76e+23;
