//! The generic Monte-Carlo state envelope shared by both transport engines.
//!
//! A plain tagged record: a species-discriminated payload plus a side-data cache that the
//! stepping callbacks in [`crate::binding`] populate at every step. The side-data fields are
//! computed, not configured: nothing outside `binding` should construct them directly.

use serde::{Deserialize, Serialize};

/// Tri-state flag for the virtual flux-crossing detection surface.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Crossing {
    /// Flux-neutrino mode is not active; the surface is not tracked.
    #[default]
    Disabled,
    /// The last known position was below the detection surface.
    Inside,
    /// The last known position was above the detection surface.
    Outside,
}

/// Per-step data cached on the state by the transport bindings: computed, not configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepData {
    /// Index of the shell containing the current position, or `-1` outside the domain.
    pub shell: i32,
    /// Density at the current position, in kg/m^3.
    pub density: f64,
    /// Current radius `|position|`, in m.
    pub radius: f64,
    /// Whether the particle being stepped is a tau lepton (as opposed to a neutrino).
    pub is_tau: bool,
    /// Flux-crossing tri-state.
    pub crossing: Crossing,
    /// Whether a crossing of the virtual detection surface was detected on the last step.
    pub has_crossed: bool,
    /// Number of crossings of the virtual detection surface observed so far this event.
    pub crossing_count: u32,
}

/// The generic state envelope threaded through both transport engines.
#[derive(Clone, Copy, Debug)]
pub struct GenericState {
    /// Position, in m.
    pub position: [f64; 3],
    /// Unit direction of travel.
    pub direction: [f64; 3],
    /// Cumulative distance travelled, in m.
    pub distance: f64,
    /// Cumulative grammage (column depth) traversed, in kg/m^2.
    pub grammage: f64,
    /// Kinetic energy (taus) or total energy (neutrinos), in GeV.
    pub energy: f64,
    /// PDG species identifier.
    pub pid: i32,
    /// Sample weight. Must be `>= 0`; `0` means the particle is dead.
    pub weight: f64,
    /// Cached, computed-only stepping side-data.
    pub step_data: StepData,
}

impl GenericState {
    /// Builds a new state at `position` travelling along `direction` with zero accumulated
    /// distance and grammage.
    #[must_use]
    pub fn new(pid: i32, energy: f64, position: [f64; 3], direction: [f64; 3], weight: f64) -> Self {
        Self {
            position,
            direction,
            distance: 0.0,
            grammage: 0.0,
            energy,
            pid,
            weight,
            step_data: StepData::default(),
        }
    }

    /// Whether this state is still alive (positive weight and above-zero energy).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.weight > 0.0 && self.energy > 0.0
    }

    /// Kills the state by zeroing its weight (spec.md section 7, weight collapse).
    pub fn kill(&mut self) {
        self.weight = 0.0;
    }

    /// Reverses the direction of travel in place, used when an engine runs backward or when an
    /// ancestor query needs the time-reversed trajectory (spec.md section 4.5).
    pub fn reverse_direction(&mut self) {
        for component in &mut self.direction {
            *component = -*component;
        }
    }

    /// `|direction|`, expected to be `1` modulo floating-point error (spec.md section 8,
    /// property 6).
    #[must_use]
    pub fn direction_norm(&self) -> f64 {
        crate::geometry::norm(self.direction)
    }
}

/// A single species/weight pair sampled as a primary (spec.md section 4.8).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Primary {
    /// PDG species identifier of the primary.
    pub pid: i32,
    /// Initial energy, in GeV.
    pub energy: f64,
    /// Event (Jacobian-folded) weight.
    pub weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_alive() {
        let state = GenericState::new(16, 1.0e+09, [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], 1.0);
        assert!(state.is_alive());
    }

    #[test]
    fn killed_state_is_not_alive() {
        let mut state = GenericState::new(16, 1.0e+09, [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], 1.0);
        state.kill();
        assert!(!state.is_alive());
        assert_eq!(state.weight, 0.0);
    }

    #[test]
    fn reverse_direction_flips_sign() {
        let mut state = GenericState::new(16, 1.0, [0.0; 3], [0.3, 0.4, 0.0], 1.0);
        state.reverse_direction();
        assert_eq!(state.direction, [-0.3, -0.4, 0.0]);
    }
}
