//! Charged-lepton transport engine interface, modelled on PUMAS (spec.md section 6).
//!
//! PUMAS is an out-of-scope external collaborator (spec.md section 1). This module exposes the
//! boundary the driver needs — continuous plus stochastic energy loss along a step, and a decay
//! proper-time draw — with one concrete implementation built on a constant effective stopping
//! power rather than a real tau energy-loss table.

use crate::binding::Binding;
use crate::constants::TAU_CTAU;
use crate::prng::Prng;
use crate::state::GenericState;

/// Outcome of one call to [`LeptonEngine::transport`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LeptonEvent {
    /// The tau survived the step (still above its decay length) and is still inside the domain.
    Stepped,
    /// The tau decayed during this step, at the position and energy now recorded in `state`.
    Decayed,
    /// The tau's energy fell to (or below) the context's energy cut.
    RangedOut,
    /// The tau left the simulation domain (escaped to space).
    Exit,
}

/// The charged-lepton transport engine's capability set (spec.md section 6).
pub trait LeptonEngine {
    /// Advances `state` by one physical step: continuous energy loss, a stochastic radiative
    /// loss, and a proper-time-based decay draw, consulting `binding` for the medium and `prng`
    /// for random draws.
    fn transport(
        &self,
        state: &mut GenericState,
        binding: &Binding,
        energy_cut: f64,
        prng: &mut Prng,
    ) -> LeptonEvent;
}

/// A simplified, deterministic-given-its-PRNG stand-in for PUMAS, using a constant effective
/// stopping power instead of a tabulated one.
pub struct PumasLike {
    /// Effective energy loss per unit grammage, in `GeV / (kg/m^2)`.
    dedx: f64,
}

impl PumasLike {
    /// Builds the default parametrization.
    #[must_use]
    pub const fn new() -> Self {
        Self { dedx: 2.0e-06 }
    }
}

impl Default for PumasLike {
    fn default() -> Self {
        Self::new()
    }
}

impl LeptonEngine for PumasLike {
    fn transport(
        &self,
        state: &mut GenericState,
        binding: &Binding,
        energy_cut: f64,
        prng: &mut Prng,
    ) -> LeptonEvent {
        let step = binding.locate_lepton(state);
        if step.shell < 0 {
            return LeptonEvent::Exit;
        }

        let density = state.step_data.density.max(1.0e-30);
        let gamma = 1.0 + state.energy / crate::constants::TAU_MASS;

        // Proper-time-based decay draw: the grammage budget before decay is exponentially
        // distributed with mean `gamma * c * tau * density` (kg/m^2 per step of length `step.length`).
        let mean_grammage = gamma * TAU_CTAU * density;
        let budget = -mean_grammage * prng.uniform01().max(1.0e-300).ln();
        let step_grammage = step.length * density;

        if budget < step_grammage {
            let travelled = budget / density;
            advance(state, travelled);
            state.energy -= self.dedx * budget;
            state.energy = state.energy.max(0.0);
            return LeptonEvent::Decayed;
        }

        advance(state, step.length);
        state.energy -= self.dedx * step_grammage;

        if state.energy <= energy_cut {
            state.energy = state.energy.max(0.0);
            return LeptonEvent::RangedOut;
        }

        LeptonEvent::Stepped
    }
}

fn advance(state: &mut GenericState, distance: f64) {
    for axis in 0..3 {
        state.position[axis] += state.direction[axis] * distance;
    }
    state.distance += distance;
    state.grammage += state.step_data.density * distance;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earth::EarthModel;

    #[test]
    fn transport_reduces_energy_or_decays() {
        let earth = EarthModel::new();
        let binding = Binding::new(&earth, crate::constants::EARTH_RADIUS, false);
        let engine = PumasLike::new();
        let mut prng = Prng::from_seed(11);
        let mut state = GenericState::new(15, 1.0e+08, [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], 1.0);
        let initial_energy = state.energy;
        let event = engine.transport(&mut state, &binding, 1.0e+03, &mut prng);
        assert!(matches!(
            event,
            LeptonEvent::Stepped | LeptonEvent::Decayed | LeptonEvent::RangedOut | LeptonEvent::Exit
        ));
        if !matches!(event, LeptonEvent::Exit) {
            assert!(state.energy <= initial_energy);
        }
    }

    #[test]
    fn exit_when_outside_domain() {
        let earth = EarthModel::new();
        let binding = Binding::new(&earth, crate::constants::EARTH_RADIUS, false);
        let engine = PumasLike::new();
        let mut prng = Prng::from_seed(5);
        let mut state = GenericState::new(
            15,
            1.0e+08,
            [0.0, 0.0, crate::constants::DOMAIN_RADIUS + 1.0],
            [0.0, 0.0, 1.0],
            1.0,
        );
        let event = engine.transport(&mut state, &binding, 1.0e+03, &mut prng);
        assert_eq!(event, LeptonEvent::Exit);
    }
}
