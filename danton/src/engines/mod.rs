//! External transport engine boundaries (spec.md section 6): neutrino transport, charged-lepton
//! transport and tau decay sampling, each modelled on a real external collaborator (ENT, PUMAS,
//! ALOUETTE/TAUOLA respectively) that this crate does not vendor or link against. Each submodule
//! defines a trait capturing the callback surface the drivers in [`crate::forward`] and
//! [`crate::backward`] actually use, plus one concrete, simplified-but-plausible implementation.

pub mod decay;
pub mod lepton;
pub mod neutrino;

pub use decay::{AlouetteLike, DecayEvent, DecayProduct, DecaySampler};
pub use lepton::{LeptonEngine, LeptonEvent, PumasLike};
pub use neutrino::{EntLike, NeutrinoEngine, NeutrinoEvent};
