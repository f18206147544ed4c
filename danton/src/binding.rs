//! Transport binding (component C5): adapters exposing the Earth model and geometry oracle to
//! each external engine, capturing per-step side data (medium index, density, radius) on the
//! state envelope as they go (spec.md section 4.5).
//!
//! The adapter bodies are kept pure and fast, since they sit in the hot loop of both engines
//! (spec.md, Design notes: "Cross-engine callbacks").

use crate::earth::EarthModel;
use crate::geometry::{self, Step};
use crate::state::{Crossing, GenericState};

/// Binds the geometry oracle and Earth model to a transport engine, tracking the optional
/// virtual flux-crossing surface.
pub struct Binding<'a> {
    earth: &'a EarthModel,
    /// Altitude of the virtual detection surface above the mean Earth radius, in m. Only
    /// meaningful when `flux_neutrino` is set.
    r_det: f64,
    flux_neutrino: bool,
}

impl<'a> Binding<'a> {
    /// Builds a binding over `earth`. `r_det` is the radius of the virtual detection surface;
    /// it is only consulted when `flux_neutrino` is `true` (spec.md section 9: flux-neutrino and
    /// decay modes are mutually exclusive at the API surface).
    #[must_use]
    pub const fn new(earth: &'a EarthModel, r_det: f64, flux_neutrino: bool) -> Self {
        Self { earth, r_det, flux_neutrino }
    }

    /// The bound Earth model.
    #[must_use]
    pub const fn earth(&self) -> &EarthModel {
        self.earth
    }

    /// Locates `state` and computes its next step, populating `state.step_data` with the medium
    /// index, density and radius, and maintaining the flux-crossing tri-state when
    /// `flux_neutrino` mode is active. Returns a step length of `0` when the neutrino has exited
    /// the atmosphere, escaped the domain, or just crossed the virtual detection surface — any of
    /// which causes the calling engine to emit an EXIT event (spec.md section 4.2, steps 6-7).
    pub fn locate_neutrino(&self, state: &mut GenericState) -> Step {
        let mut step = self.populate(state);

        if self.flux_neutrino {
            if self.update_crossing(state) {
                step.length = 0.0;
            }
        } else if geometry::has_escaped_atmosphere(self.earth, step.radius) {
            step.length = 0.0;
        }

        step
    }

    /// Locates `state` for the charged-lepton engine, populating `state.step_data` only (no
    /// crossing bookkeeping: the lepton binding additionally zeroes any magnetic-field locals,
    /// which this crate's simplified lepton engine does not model).
    pub fn locate_lepton(&self, state: &mut GenericState) -> Step {
        self.populate(state)
    }

    fn populate(&self, state: &mut GenericState) -> Step {
        let step = geometry::step(self.earth, state.position, state.direction);
        state.step_data.shell = step.shell;
        state.step_data.radius = step.radius;
        state.step_data.density = if step.shell >= 0 {
            self.earth.density(step.shell as usize, step.radius).0
        } else {
            0.0
        };
        step
    }

    /// Updates the flux-crossing tri-state, returning `true` iff a new crossing was detected on
    /// this call.
    fn update_crossing(&self, state: &mut GenericState) -> bool {
        let above = geometry::is_above_surface(state.step_data.radius, self.r_det);
        let side = if above { Crossing::Outside } else { Crossing::Inside };

        let crossed = match state.step_data.crossing {
            Crossing::Disabled => false,
            Crossing::Inside => above,
            Crossing::Outside => !above,
        };

        state.step_data.crossing = side;
        state.step_data.has_crossed = crossed;
        if crossed {
            state.step_data.crossing_count += 1;
        }
        crossed
    }

    /// `(Z, A)` of the material occupying `shell`, or `None` outside the domain.
    #[must_use]
    pub fn medium(&self, shell: i32) -> Option<(f64, f64)> {
        if shell < 0 {
            return None;
        }
        let shell = self.earth.shell(shell as usize);
        Some((shell.z(), shell.a()))
    }
}
