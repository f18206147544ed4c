//! Backward driver (component C7, spec.md section 4.7): Backward Monte-Carlo (BMC) propagation
//! from a sampled final-state tau or neutrino back to a primary compatible with the requested
//! channel, accumulating the importance weights that make the ensemble an unbiased flux
//! estimator.

use crate::binding::Binding;
use crate::constants::{
    BMC_DECAY_BIAS, BMC_DECAY_BIAS_PROBABILITY, BMC_LAMBDA_0, MAX_DECAY_RETRIES, TAU_CTAU, TAU_MASS,
};
use crate::context::Context;
use crate::earth::ATMOSPHERE_START;
use crate::engines::{DecayEvent, DecaySampler, LeptonEngine, LeptonEvent, NeutrinoEngine};
use crate::physics::Physics;
use crate::pid::{self, Species, NU_TAU, NU_TAU_BAR};
use crate::record::{EventRecord, TauPoint};
use crate::state::GenericState;

/// One tau leg recovered along the backward chain: the decay vertex it was seeded or regenerated
/// from, and the production vertex stage 2/3 inverted it back to. Logged only once the whole
/// chain is accepted (spec.md section 4.7, "The decay-product logging path ... mirrors the
/// forward one").
struct PendingTauLeg {
    generation: u32,
    pid: i32,
    production: TauPoint,
    decay: TauPoint,
}

/// What a backward event starts from (spec.md section 4.7, "Goal").
#[derive(Clone, Copy, Debug)]
pub enum BackwardSeed {
    /// A tau sampled at the detector, with the given kinetic energy/direction/position.
    Tau { state: GenericState },
    /// A neutrino crossing the detector surface.
    Neutrino { state: GenericState },
}

/// Drives a single backward (BMC) event.
pub struct BackwardDriver<'p> {
    physics: &'p Physics,
}

impl<'p> BackwardDriver<'p> {
    /// Builds a driver bound to the process-wide physics handle.
    #[must_use]
    pub const fn new(physics: &'p Physics) -> Self {
        Self { physics }
    }

    /// Runs one backward event, returning its records, or an empty vector if the primary
    /// acceptance test (stage 5) rejects the trajectory (spec.md section 4.7, stage 5).
    ///
    /// # Errors
    ///
    /// Returns an error if `context`'s sampler has gone stale since construction.
    pub fn run_event(
        &self,
        context: &mut Context,
        eventid: u64,
        seed: BackwardSeed,
        requested_primary: i32,
    ) -> crate::Result<Vec<EventRecord>> {
        context.check_sampler_fresh()?;

        let mut records = Vec::new();
        let mut legs: Vec<PendingTauLeg> = Vec::new();
        let (mut state, mut weight, mut decay_point) = match seed {
            BackwardSeed::Tau { state } => {
                let decay_point =
                    TauPoint { kinetic: state.energy, direction: state.direction, position: state.position };
                let (state, weight) = self.invert_tau_decay(state);
                (state, weight, Some(decay_point))
            }
            BackwardSeed::Neutrino { state } => (state, state.weight, None),
        };
        let mut generation = 0_u32;

        // A tau is tracked backward (stages 1-2) until it is converted, at its production vertex,
        // into the neutrino that is then tracked backward in turn (stages 3-4); the neutrino leg
        // may itself bottom out on another tau (regeneration), which re-enters stages 1-2 with an
        // incremented generation (spec.md section 4.7, stage 4).
        loop {
            if weight <= 0.0 {
                return Ok(Vec::new());
            }

            if Species::from_pdg(state.pid).is_some_and(Species::is_tau) {
                let decay = decay_point.expect("a tau leg always has a decay vertex");
                let tau_pid = state.pid;
                let Some((new_weight, production)) =
                    self.propagate_tau_backward(context, &mut state, weight)
                else {
                    return Ok(Vec::new());
                };
                legs.push(PendingTauLeg { generation, pid: tau_pid, production, decay });
                weight = new_weight;
                decay_point = None;
                continue;
            }

            match self.transport_neutrino_backward(context, &mut state, weight) {
                None => return Ok(Vec::new()),
                Some(NeutrinoBackwardOutcome::TauAncestor { weight: new_weight }) => {
                    generation += 1;
                    weight = new_weight;
                    decay_point = Some(TauPoint {
                        kinetic: state.energy,
                        direction: [-state.direction[0], -state.direction[1], -state.direction[2]],
                        position: state.position,
                    });
                    continue;
                }
                Some(NeutrinoBackwardOutcome::Exit { pid, weight: final_weight }) => {
                    if pid != requested_primary {
                        return Ok(Vec::new());
                    }
                    records.push(EventRecord::Ancestor {
                        eventid,
                        pid,
                        energy: state.energy,
                        direction: state.direction,
                        position: state.position,
                        weight: final_weight,
                    });
                    for leg in legs {
                        self.log_tau_leg(context, &leg, &mut records);
                    }
                    return Ok(records);
                }
            }
        }
    }

    /// Mirrors the forward driver's decay-product logging for one recovered tau leg: samples a
    /// forward decay at the leg's decay vertex (20 retries) and emits the tau-pair plus any
    /// charged decay products found in the atmosphere (spec.md section 4.7, "The decay-product
    /// logging path ... mirrors the forward one").
    fn log_tau_leg(&self, context: &mut Context, leg: &PendingTauLeg, records: &mut Vec<EventRecord>) {
        records.push(EventRecord::TauPair {
            generation: leg.generation,
            pid: leg.pid,
            production: leg.production,
            decay: leg.decay,
        });

        let mut decay = None;
        for _ in 0..MAX_DECAY_RETRIES {
            let candidate = self.physics.decay_sampler().decay(
                leg.pid,
                leg.decay.kinetic,
                leg.decay.direction,
                context.prng_mut(),
            );
            if !candidate.products.is_empty() {
                decay = Some(candidate);
                break;
            }
        }
        let Some(DecayEvent { products }) = decay else { return };

        let step = crate::geometry::step(context.earth(), leg.decay.position, leg.decay.direction);
        let in_atmosphere = step.shell >= crate::earth::ATMOSPHERE_START as i32;
        if !in_atmosphere {
            return;
        }

        for product in products {
            match Species::from_pdg(product.pid) {
                Some(Species::NuTau | Species::NuTauBar | Species::NuEBar | Species::NuE | Species::NuMu | Species::NuMuBar) => {}
                _ if product.pid == pid::MU || product.pid == pid::MU_BAR => {}
                _ => records.push(EventRecord::DecayProduct { pid: product.pid, momentum: product.momentum }),
            }
        }
    }

    /// Stage 1: Jacobian of the forward decay distribution at the sampled vertex,
    /// `m_tau / (c * tau_0 * P_f)` (spec.md section 4.7, stage 1).
    fn invert_tau_decay(&self, mut state: GenericState) -> (GenericState, f64) {
        let p_f = (state.energy * (state.energy + 2.0 * TAU_MASS)).sqrt().max(1.0e-12);
        let weight = TAU_MASS / (TAU_CTAU * p_f);
        state.reverse_direction();
        (state, weight)
    }

    /// Stage 2: draws a grammage increment and steps the lepton engine backward, applying the
    /// biased decay/production selection when the tentative vertex lies in the atmosphere and is
    /// upgoing (spec.md section 4.7, stage 2). On success, folds in stage 3's full BMC weight
    /// (spec.md section 4.7, stage 3) and converts `state` in place from the tracked tau into its
    /// parent neutrino flavour, so that the caller can hand it to
    /// [`Self::transport_neutrino_backward`] (stage 4).
    fn propagate_tau_backward(
        &self,
        context: &mut Context,
        state: &mut GenericState,
        weight: f64,
    ) -> Option<(f64, TauPoint)> {
        let earth = context.earth().clone();
        let binding = Binding::new(&earth, crate::constants::EARTH_RADIUS, false);
        let grammage_start = state.grammage;

        let u = context.prng_mut().uniform01();
        let delta_x = -BMC_LAMBDA_0 * u.max(1.0e-300).ln().abs();
        let grammage_max = state.grammage + delta_x;

        let mut weight = weight;
        while state.grammage < grammage_max {
            if !state.is_alive() || weight <= 0.0 {
                return None;
            }
            let event = self.physics.lepton_engine().transport(state, &binding, context.energy_cut(), context.prng_mut());
            match event {
                LeptonEvent::Exit | LeptonEvent::RangedOut => return None,
                LeptonEvent::Stepped | LeptonEvent::Decayed => {}
            }

            let rho = state.step_data.density.max(1.0e-30);
            let upgoing = crate::geometry::dot(state.position, state.direction) < 0.0;
            let in_air = state.step_data.shell >= ATMOSPHERE_START as i32;

            if in_air && upgoing {
                let lambda_d = TAU_CTAU * (state.energy * (state.energy + 2.0 * TAU_MASS)).sqrt().max(1.0e-12)
                    / TAU_MASS;
                let lambda_b = BMC_LAMBDA_0 / rho;
                let p_decay = lambda_b / (lambda_b + lambda_d);

                if context.prng_mut().uniform01() < BMC_DECAY_BIAS_PROBABILITY {
                    weight *= p_decay / BMC_DECAY_BIAS_PROBABILITY;
                    return self.accept_production_vertex(context, state, &binding, weight, grammage_start);
                }
                weight *= (1.0 - p_decay) / (1.0 - BMC_DECAY_BIAS_PROBABILITY);
            }
        }

        self.accept_production_vertex(context, state, &binding, weight, grammage_start)
    }

    /// Stage 3: folds the production-vertex BMC weight `w <- w * lambda_B * lambda_D /
    /// ((lambda_B + lambda_D) * lambda_P * p0)` into `weight` and converts `state` from the
    /// tracked tau into its parent neutrino flavour (spec.md section 4.7, stage 3).
    fn accept_production_vertex(
        &self,
        context: &Context,
        state: &mut GenericState,
        binding: &Binding,
        weight: f64,
        grammage_start: f64,
    ) -> Option<(f64, TauPoint)> {
        let rho = state.step_data.density.max(1.0e-30);
        let (z, a) = binding.medium(state.step_data.shell)?;
        let sigma = self.physics.neutrino_engine().cross_section(state.pid, state.energy, z, a);
        let lambda_p = crate::engines::neutrino::mean_free_path(sigma, a, rho);
        let lambda_d = TAU_CTAU * (state.energy * (state.energy + 2.0 * TAU_MASS)).sqrt().max(1.0e-12) / TAU_MASS;
        let lambda_b = BMC_LAMBDA_0 / rho;
        let p0 = (-(state.grammage - grammage_start) / BMC_LAMBDA_0).exp();
        let weight = weight * (lambda_b * lambda_d) / ((lambda_b + lambda_d) * lambda_p * p0.max(1.0e-300));

        let production = TauPoint {
            kinetic: state.energy,
            direction: [-state.direction[0], -state.direction[1], -state.direction[2]],
            position: state.position,
        };
        state.pid = if Species::from_pdg(state.pid) == Some(Species::Tau) { NU_TAU } else { NU_TAU_BAR };
        let _ = context;
        Some((weight, production))
    }

    /// Stage 4: walks the neutrino backward, at each interaction vertex consulting
    /// [`NeutrinoEngine::ancestor_weights`] to choose between continuing as the same flavour or
    /// an inverted tau decay (spec.md section 4.7, stage 4, "Ancestor callback").
    fn transport_neutrino_backward(
        &self,
        context: &mut Context,
        state: &mut GenericState,
        weight: f64,
    ) -> Option<NeutrinoBackwardOutcome> {
        let earth = context.earth().clone();
        let binding = Binding::new(&earth, crate::constants::EARTH_RADIUS, context.flags().flux_neutrino);
        let engine = self.physics.neutrino_engine();

        let mut weight = weight;
        let mut retries = 0;
        loop {
            if weight <= 0.0 || retries > MAX_DECAY_RETRIES {
                return None;
            }
            retries += 1;

            let step = binding.locate_neutrino(state);
            if step.shell < 0 || step.length == 0.0 {
                return Some(NeutrinoBackwardOutcome::Exit { pid: state.pid, weight });
            }
            let Some((z, a)) = binding.medium(step.shell) else {
                return Some(NeutrinoBackwardOutcome::Exit { pid: state.pid, weight });
            };

            let rho = state.step_data.density.max(1.0e-30);
            let sigma = engine.cross_section(state.pid, state.energy, z, a);
            let lambda = crate::engines::neutrino::mean_free_path(sigma, a, rho);
            let free_path = -lambda * context.prng_mut().uniform01().max(1.0e-300).ln();

            if free_path < step.length {
                advance(state, free_path);

                let candidates = engine.ancestor_weights(state.pid, state.energy, rho);
                let total: f64 = candidates.iter().map(|&(_, w)| w).sum();
                if total <= 0.0 {
                    return Some(NeutrinoBackwardOutcome::Exit { pid: state.pid, weight });
                }
                let mut u = context.prng_mut().uniform01() * total;
                let mut parent_pid = candidates[0].0;
                for &(pid, w) in &candidates {
                    parent_pid = pid;
                    if u < w {
                        break;
                    }
                    u -= w;
                }

                if Species::from_pdg(parent_pid).is_some_and(Species::is_tau) {
                    // The undecay sampler over-represents hard parent energies by
                    // BMC_DECAY_BIAS relative to the forward decay spectrum; divide it back out.
                    let (parent_energy, undecay_weight) =
                        self.physics.decay_sampler().undecay(state.pid, state.energy, context.prng_mut());
                    state.pid = parent_pid;
                    state.energy = parent_energy;
                    weight *= undecay_weight / BMC_DECAY_BIAS;
                    return Some(NeutrinoBackwardOutcome::TauAncestor { weight });
                }
                state.pid = parent_pid;
            } else {
                advance(state, step.length);
            }

            if state.energy > context.sampler().energy[1] {
                return None;
            }
        }
    }
}

/// Outcome of one call to [`BackwardDriver::transport_neutrino_backward`].
enum NeutrinoBackwardOutcome {
    /// The backward-tracked neutrino reached the simulation boundary with the given species and
    /// accumulated weight.
    Exit {
        /// PDG species identifier at exit.
        pid: i32,
        /// Accumulated BMC weight.
        weight: f64,
    },
    /// An inverted tau decay was selected: `state` has been converted back into the parent tau
    /// and the caller should resume stage 2 with an incremented generation.
    TauAncestor {
        /// Accumulated BMC weight.
        weight: f64,
    },
}

fn advance(state: &mut GenericState, distance: f64) {
    for axis in 0..3 {
        state.position[axis] += state.direction[axis] * distance;
    }
    state.distance += distance;
    state.grammage += state.step_data.density * distance;
}
