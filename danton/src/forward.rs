//! Forward driver (component C6, spec.md section 4.6): neutrino transport, tau production,
//! charged-lepton transport, tau decay and regeneration, walked iteratively with a work queue
//! rather than recursively so that a long regeneration chain cannot overflow the stack (spec.md
//! Design notes, "Recursion depth").

use crate::constants::MAX_DECAY_RETRIES;
use crate::context::Context;
use crate::engines::{DecayEvent, DecaySampler, LeptonEngine, LeptonEvent, NeutrinoEngine, NeutrinoEvent};
use crate::physics::Physics;
use crate::pid::{self, Species};
use crate::record::{EventRecord, TauPoint};
use crate::state::GenericState;

/// One pending neutrino awaiting transport: either the original primary or a regeneration
/// daughter spawned by a tau decay.
struct Pending {
    state: GenericState,
    generation: u32,
}

/// Drives a single forward event from a primary neutrino to exhaustion, emitting records in
/// causal order (spec.md section 5, "Ordering guarantees").
pub struct ForwardDriver<'p> {
    physics: &'p Physics,
}

impl<'p> ForwardDriver<'p> {
    /// Builds a driver bound to the process-wide physics handle.
    #[must_use]
    pub const fn new(physics: &'p Physics) -> Self {
        Self { physics }
    }

    /// Runs one event starting from `primary`, returning the records it produced.
    ///
    /// # Errors
    ///
    /// Returns an error if `context`'s sampler has gone stale since construction.
    pub fn run_event(
        &self,
        context: &mut Context,
        eventid: u64,
        mut primary: GenericState,
    ) -> crate::Result<Vec<EventRecord>> {
        context.check_sampler_fresh()?;

        let mut records = Vec::new();
        let ancestor_direction = primary.direction;
        let ancestor_position = primary.position;
        let ancestor_weight = primary.weight;
        primary.step_data.crossing = if context.flags().flux_neutrino {
            crate::state::Crossing::Inside
        } else {
            crate::state::Crossing::Disabled
        };

        let mut queue = vec![Pending { state: primary, generation: 0 }];
        let mut ancestor_emitted = false;

        while let Some(Pending { mut state, generation }) = queue.pop() {
            self.run_neutrino_chain(
                context,
                eventid,
                &mut state,
                generation,
                ancestor_direction,
                ancestor_position,
                ancestor_weight,
                &mut ancestor_emitted,
                &mut records,
                &mut queue,
            );
        }

        Ok(records)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_neutrino_chain(
        &self,
        context: &mut Context,
        eventid: u64,
        state: &mut GenericState,
        generation: u32,
        ancestor_direction: [f64; 3],
        ancestor_position: [f64; 3],
        ancestor_weight: f64,
        ancestor_emitted: &mut bool,
        records: &mut Vec<EventRecord>,
        queue: &mut Vec<Pending>,
    ) {
        let earth = context.earth().clone();
        let r_det = crate::constants::EARTH_RADIUS + context.sampler().altitude[0];
        let flux_neutrino = context.flags().flux_neutrino;
        let binding = crate::binding::Binding::new(&earth, r_det, flux_neutrino);

        loop {
            if !state.is_alive() || state.energy <= context.energy_cut() {
                return;
            }

            let event = self.physics.neutrino_engine().transport(state, &binding, context.prng_mut());
            if context.flags().longitudinal_approx {
                state.direction = ancestor_direction;
            }

            match event {
                NeutrinoEvent::Scatter => {}
                NeutrinoEvent::Exit => {
                    if context.flags().flux_neutrino {
                        if state.step_data.has_crossed {
                            if state.step_data.crossing_count >= 2 {
                                emit_ancestor_once(
                                    ancestor_emitted,
                                    records,
                                    eventid,
                                    state.pid,
                                    state.energy,
                                    ancestor_direction,
                                    ancestor_position,
                                    ancestor_weight,
                                );
                                records.push(EventRecord::Neutrino {
                                    eventid,
                                    pid: state.pid,
                                    energy: state.energy,
                                    direction: state.direction,
                                    position: state.position,
                                    weight: ancestor_weight,
                                });
                                return;
                            }
                            // First crossing: reset and resume.
                            state.step_data.crossing = crate::state::Crossing::Inside;
                            state.step_data.has_crossed = false;
                            continue;
                        }
                    }
                    return;
                }
                NeutrinoEvent::ChargedCurrent => {
                    emit_ancestor_once(
                        ancestor_emitted,
                        records,
                        eventid,
                        state.pid,
                        state.energy,
                        ancestor_direction,
                        ancestor_position,
                        ancestor_weight,
                    );
                    self.run_tau_chain(
                        context,
                        state,
                        generation,
                        ancestor_direction,
                        ancestor_weight,
                        records,
                        queue,
                    );
                    return;
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_tau_chain(
        &self,
        context: &mut Context,
        state: &mut GenericState,
        generation: u32,
        ancestor_direction: [f64; 3],
        _ancestor_weight: f64,
        records: &mut Vec<EventRecord>,
        queue: &mut Vec<Pending>,
    ) {
        let earth = context.earth().clone();
        let binding = crate::binding::Binding::new(&earth, crate::constants::EARTH_RADIUS, false);
        let production =
            TauPoint { kinetic: state.energy, direction: state.direction, position: state.position };

        loop {
            if !state.is_alive() {
                return;
            }

            let event =
                self.physics
                    .lepton_engine()
                    .transport(state, &binding, context.energy_cut(), context.prng_mut());
            if context.flags().longitudinal_approx {
                state.direction = ancestor_direction;
            }

            match event {
                LeptonEvent::Stepped => {}
                LeptonEvent::Exit | LeptonEvent::RangedOut => return,
                LeptonEvent::Decayed => {
                    let decay = TauPoint { kinetic: state.energy, direction: state.direction, position: state.position };
                    records.push(EventRecord::TauPair {
                        generation,
                        pid: state.pid,
                        production,
                        decay,
                    });

                    if context.flags().decay_enabled {
                        self.decay_and_regenerate(context, state, generation, records, queue);
                    }
                    return;
                }
            }
        }
    }

    fn decay_and_regenerate(
        &self,
        context: &mut Context,
        state: &GenericState,
        generation: u32,
        records: &mut Vec<EventRecord>,
        queue: &mut Vec<Pending>,
    ) {
        let mut decay = None;
        for _ in 0..MAX_DECAY_RETRIES {
            let candidate =
                self.physics.decay_sampler().decay(state.pid, state.energy, state.direction, context.prng_mut());
            if !candidate.products.is_empty() {
                decay = Some(candidate);
                break;
            }
        }
        let Some(DecayEvent { products }) = decay else { return };

        let in_atmosphere = state.step_data.shell >= crate::earth::ATMOSPHERE_START as i32;

        for product in products {
            match Species::from_pdg(product.pid) {
                Some(Species::NuTau | Species::NuTauBar | Species::NuEBar) => {
                    let norm = crate::geometry::norm(product.momentum).max(1.0e-300);
                    let direction =
                        [product.momentum[0] / norm, product.momentum[1] / norm, product.momentum[2] / norm];
                    let daughter = GenericState::new(product.pid, norm, state.position, direction, state.weight);
                    queue.push(Pending { state: daughter, generation: generation + 1 });
                }
                Some(Species::NuE | Species::NuMu | Species::NuMuBar) => {
                    // silent, per spec.md section 4.6 step 4
                }
                _ if product.pid == pid::MU || product.pid == pid::MU_BAR => {}
                _ => {
                    if in_atmosphere {
                        records.push(EventRecord::DecayProduct { pid: product.pid, momentum: product.momentum });
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_ancestor_once(
    ancestor_emitted: &mut bool,
    records: &mut Vec<EventRecord>,
    eventid: u64,
    pid: i32,
    energy: f64,
    direction: [f64; 3],
    position: [f64; 3],
    weight: f64,
) {
    if *ancestor_emitted {
        return;
    }
    *ancestor_emitted = true;
    records.push(EventRecord::Ancestor { eventid, pid, energy, direction, position, weight });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModeFlags;
    use crate::earth::EarthModel;
    use crate::prng::Prng;
    use crate::sampler::Sampler;

    fn sampler() -> Sampler {
        Sampler {
            altitude: [0.0, 0.0],
            cos_theta: [0.15, 0.25],
            elevation: [0.0, 0.0],
            energy: [1.0e+08, 1.0e+12],
            weights: [0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
        }
    }

    fn with_physics<F: FnOnce(&Physics)>(tag: &str, body: F) {
        let _guard = crate::physics::TEST_LOCK.lock().unwrap();
        let earth = EarthModel::new();
        let dir = std::env::temp_dir().join(format!("danton-forward-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("materials.b");
        let physics = Physics::init(&path, &earth).unwrap();
        body(&physics);
        physics.finalize();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn an_event_terminates_and_returns_records() {
        with_physics("terminates", |physics| {
            let mut context =
                Context::with_defaults(EarthModel::new(), Prng::from_seed(7), sampler(), ModeFlags::default())
                    .unwrap();
            let driver = ForwardDriver::new(physics);

            let primary = GenericState::new(
                pid::NU_TAU,
                1.0e+09,
                [0.0, 0.0, -crate::constants::EARTH_RADIUS - 1.0e+05],
                [0.0, 0.0, 1.0],
                1.0,
            );
            let records = driver.run_event(&mut context, 1, primary).unwrap();
            // Not every draw produces an interaction; absence of a panic and a well-formed result
            // is the property under test here.
            assert!(records.len() <= 64);
        });
    }

    #[test]
    fn context_remains_usable_after_sampler_update() {
        with_physics("sampler-update", |physics| {
            let mut context =
                Context::with_defaults(EarthModel::new(), Prng::from_seed(7), sampler(), ModeFlags::default())
                    .unwrap();
            let mut updated = sampler();
            updated.energy[1] *= 3.0;
            context.update_sampler(updated).unwrap();
            let driver = ForwardDriver::new(physics);
            let primary = GenericState::new(
                pid::NU_E_BAR,
                1.0e+09,
                [0.0, 0.0, -crate::constants::EARTH_RADIUS - 1.0e+05],
                [0.0, 0.0, 1.0],
                1.0,
            );
            assert!(driver.run_event(&mut context, 2, primary).is_ok());
        });
    }
}
