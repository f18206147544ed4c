//! PDG particle identifiers for the species this crate transports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PDG code for `nu_e`.
pub const NU_E: i32 = 12;
/// PDG code for `nu_e_bar`.
pub const NU_E_BAR: i32 = -12;
/// PDG code for `nu_mu`.
pub const NU_MU: i32 = 14;
/// PDG code for `nu_mu_bar`.
pub const NU_MU_BAR: i32 = -14;
/// PDG code for `nu_tau`.
pub const NU_TAU: i32 = 16;
/// PDG code for `nu_tau_bar`.
pub const NU_TAU_BAR: i32 = -16;
/// PDG code for `tau-`.
pub const TAU: i32 = 15;
/// PDG code for `tau+`.
pub const TAU_BAR: i32 = -15;
/// PDG code for `mu-`.
pub const MU: i32 = 13;
/// PDG code for `mu+`.
pub const MU_BAR: i32 = -13;

/// One of the 8 species the [`crate::sampler::Sampler`] can weight.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Species {
    /// `nu_e`.
    NuE,
    /// `nu_e_bar`.
    NuEBar,
    /// `nu_mu`.
    NuMu,
    /// `nu_mu_bar`.
    NuMuBar,
    /// `nu_tau`.
    NuTau,
    /// `nu_tau_bar`.
    NuTauBar,
    /// `tau-`.
    Tau,
    /// `tau+`.
    TauBar,
}

/// All 8 species, in the fixed order used by [`crate::sampler::Sampler`] weight vectors.
pub const ALL_SPECIES: [Species; 8] = [
    Species::NuE,
    Species::NuEBar,
    Species::NuMu,
    Species::NuMuBar,
    Species::NuTau,
    Species::NuTauBar,
    Species::Tau,
    Species::TauBar,
];

impl Species {
    /// The PDG Monte-Carlo code for this species.
    #[must_use]
    pub const fn pdg(self) -> i32 {
        match self {
            Self::NuE => NU_E,
            Self::NuEBar => NU_E_BAR,
            Self::NuMu => NU_MU,
            Self::NuMuBar => NU_MU_BAR,
            Self::NuTau => NU_TAU,
            Self::NuTauBar => NU_TAU_BAR,
            Self::Tau => TAU,
            Self::TauBar => TAU_BAR,
        }
    }

    /// Converts a PDG code into a [`Species`], if it is one of the 8 known ones.
    #[must_use]
    pub const fn from_pdg(pid: i32) -> Option<Self> {
        Some(match pid {
            NU_E => Self::NuE,
            NU_E_BAR => Self::NuEBar,
            NU_MU => Self::NuMu,
            NU_MU_BAR => Self::NuMuBar,
            NU_TAU => Self::NuTau,
            NU_TAU_BAR => Self::NuTauBar,
            TAU => Self::Tau,
            TAU_BAR => Self::TauBar,
            _ => return None,
        })
    }

    /// Whether this species is a neutrino (as opposed to a charged tau).
    #[must_use]
    pub const fn is_neutrino(self) -> bool {
        !matches!(self, Self::Tau | Self::TauBar)
    }

    /// Whether this species is a tau lepton (`tau-` or `tau+`).
    #[must_use]
    pub const fn is_tau(self) -> bool {
        matches!(self, Self::Tau | Self::TauBar)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pdg())
    }
}

/// Returns `true` if `pid` is a primary flavour the forward driver can turn into a tau: only
/// `nu_e_bar` and `nu_tau`/`nu_tau_bar` interact to produce a charged tau.
#[must_use]
pub const fn can_produce_tau(pid: i32) -> bool {
    pid == NU_E_BAR || pid == NU_TAU || pid == NU_TAU_BAR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_pdg() {
        for species in ALL_SPECIES {
            assert_eq!(Species::from_pdg(species.pdg()), Some(species));
        }
    }

    #[test]
    fn unknown_pdg_is_none() {
        assert_eq!(Species::from_pdg(22), None);
    }

    #[test]
    fn tau_producing_primaries() {
        assert!(can_produce_tau(NU_E_BAR));
        assert!(can_produce_tau(NU_TAU));
        assert!(can_produce_tau(NU_TAU_BAR));
        assert!(!can_produce_tau(NU_E));
        assert!(!can_produce_tau(NU_MU));
    }
}
