//! Neutrino transport engine interface, modelled on ENT (spec.md section 6).
//!
//! ENT itself is an out-of-scope external collaborator (spec.md section 1); this module defines
//! the trait boundary the driver talks to and one concrete, simplified implementation that is
//! physically plausible (deep-inelastic-like cross sections, charged-current/neutral-current
//! branching, a Glashow-resonance-like channel for `nu_e_bar`) without depending on a real
//! cross-section table.

use crate::binding::Binding;
use crate::constants::AVOGADRO;
use crate::pid::{self, Species};
use crate::prng::Prng;
use crate::state::GenericState;

/// Outcome of one call to [`NeutrinoEngine::transport`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NeutrinoEvent {
    /// A neutral-current-like interaction: `state` continues as the same species with reduced
    /// energy.
    Scatter,
    /// A charged-current-like interaction: `state` has been converted in place into the produced
    /// charged lepton (`state.pid` now identifies it).
    ChargedCurrent,
    /// The neutrino left the simulation domain, escaped the atmosphere, or (in flux-neutrino
    /// mode) crossed the virtual detection surface.
    Exit,
}

/// The neutrino transport engine's capability set (spec.md section 6).
pub trait NeutrinoEngine {
    /// Total interaction cross section per target nucleon, in m^2, for species `pid` at
    /// `energy` (GeV) off a target with the given `(z, a)`.
    fn cross_section(&self, pid: i32, energy: f64, z: f64, a: f64) -> f64;

    /// Advances `state` to its next interaction or exit, consulting `binding` for the medium and
    /// `prng` for every random draw (spec.md section 4.5/6).
    fn transport(&self, state: &mut GenericState, binding: &Binding, prng: &mut Prng) -> NeutrinoEvent;

    /// Backward ancestor callback: the branching-ratio matrix for the backward parent choice at
    /// `(pid, energy, density)` (spec.md section 4.7, Ancestor callback). Returns
    /// `(parent_pid, weight)` pairs.
    fn ancestor_weights(&self, pid: i32, energy: f64, density: f64) -> Vec<(i32, f64)>;
}

/// Mean free path of an interaction with cross section `sigma` (m^2) off nucleons of mass number
/// `a` (g/mol) at density `rho` (kg/m^3): `lambda = A / (sigma * N_A * rho)` (spec.md section
/// 4.7, stage 3), with `A` converted from g/mol to kg/mol.
#[must_use]
pub fn mean_free_path(sigma: f64, a: f64, rho: f64) -> f64 {
    (a * 1.0e-03) / (sigma * AVOGADRO * rho)
}

/// Breit-Wigner-like weight peaking at the Glashow resonance (`nu_e_bar + e- -> W- -> tau- +
/// nu_tau_bar`, around 6.3 PeV), used to scale the charged-current probability for `nu_e_bar`.
fn glashow_weight(energy: f64) -> f64 {
    const E_RES: f64 = 6.3e+06;
    const WIDTH: f64 = 2.1e+06;
    let x = (energy - E_RES) / WIDTH;
    1.0 / x.mul_add(x, 1.0)
}

/// A simplified, deterministic-given-its-PRNG stand-in for ENT.
pub struct EntLike {
    sigma0: f64,
    epsilon: f64,
}

impl EntLike {
    /// Builds the default parametrization: `sigma(E) = sigma0 * E^epsilon`.
    #[must_use]
    pub const fn new() -> Self {
        Self { sigma0: 5.4e-41, epsilon: 0.363 }
    }

    fn cc_probability(&self, pid: i32, energy: f64) -> f64 {
        match Species::from_pdg(pid) {
            Some(Species::NuTau | Species::NuTauBar) => 0.7,
            Some(Species::NuEBar) => 0.9 * glashow_weight(energy).min(1.0),
            _ => 0.0,
        }
    }
}

impl Default for EntLike {
    fn default() -> Self {
        Self::new()
    }
}

impl NeutrinoEngine for EntLike {
    fn cross_section(&self, _pid: i32, energy: f64, _z: f64, a: f64) -> f64 {
        self.sigma0 * energy.powf(self.epsilon) * a
    }

    fn transport(&self, state: &mut GenericState, binding: &Binding, prng: &mut Prng) -> NeutrinoEvent {
        loop {
            let step = binding.locate_neutrino(state);
            if step.shell < 0 || step.length == 0.0 {
                return NeutrinoEvent::Exit;
            }

            let Some((z, a)) = binding.medium(step.shell) else {
                return NeutrinoEvent::Exit;
            };
            let sigma = self.cross_section(state.pid, state.energy, z, a);
            let lambda = mean_free_path(sigma, a, state.step_data.density.max(1.0e-30));
            let free_path = -lambda * prng.uniform01().max(1.0e-300).ln();

            if free_path < step.length {
                advance(state, free_path);
                return self.interact(state, prng);
            }

            advance(state, step.length);
        }
    }

    fn ancestor_weights(&self, pid: i32, energy: f64, density: f64) -> Vec<(i32, f64)> {
        match Species::from_pdg(pid) {
            Some(Species::NuEBar) => vec![(pid::NU_E_BAR, 1.0)],
            Some(Species::NuTau) => {
                vec![(pid::NU_TAU, 1.0), (pid::TAU, 1.63e-17 * energy.powf(1.363) * density)]
            }
            Some(Species::NuTauBar) => {
                vec![(pid::NU_TAU_BAR, 1.0), (pid::TAU_BAR, 1.63e-17 * energy.powf(1.363) * density)]
            }
            _ => vec![(pid, 1.0)],
        }
    }
}

impl EntLike {
    fn interact(&self, state: &mut GenericState, prng: &mut Prng) -> NeutrinoEvent {
        let cc_probability = self.cc_probability(state.pid, state.energy);
        let is_cc = prng.uniform01() < cc_probability;
        // inelasticity: fraction of energy transferred to the hadronic system (not tracked)
        let y = prng.uniform01().powf(2.0);

        if is_cc {
            state.pid = if state.pid == pid::NU_E_BAR || state.pid == pid::NU_TAU_BAR {
                pid::TAU_BAR
            } else {
                pid::TAU
            };
            state.energy *= 1.0 - y;
            NeutrinoEvent::ChargedCurrent
        } else {
            state.energy *= 1.0 - y;
            NeutrinoEvent::Scatter
        }
    }
}

fn advance(state: &mut GenericState, distance: f64) {
    for axis in 0..3 {
        state.position[axis] += state.direction[axis] * distance;
    }
    state.distance += distance;
    state.grammage += state.step_data.density * distance;
}
