//! Run controller (component C8, spec.md section 4.8): draws primaries from the sampler, selects
//! forward, backward, or grammage-only transport per event, and collects the emitted records.

use crate::backward::{BackwardDriver, BackwardSeed};
use crate::constants::EARTH_RADIUS;
use crate::context::Context;
use crate::earth::EarthModel;
use crate::forward::ForwardDriver;
use crate::geometry;
use crate::physics::Physics;
use crate::pid::{self, Species, ALL_SPECIES};
use crate::prng::Prng;
use crate::record::EventRecord;
use crate::sampler::Sampler;
use crate::state::GenericState;
use crate::{Error, Result};

/// Which of the three transport strategies a run exercises (spec.md section 4.8).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    /// Drive primaries forward from the sampler's energy/angle distribution.
    Forward,
    /// Invert the sampler's final-state distribution backward to a primary (BMC).
    Backward,
    /// Bypass physics and only accumulate grammage along sampled trajectories.
    Grammage,
}

/// The event/bin count, tau-decay budget and primary channel a run is configured with (spec.md
/// section 4.8 and section 6, CLI surface).
#[derive(Clone, Copy, Debug)]
pub struct RunConfig {
    /// Number of events to drive (forward/backward) or grid bins to scan (grammage).
    pub events: u64,
    /// `-t/--taus M`: stop driving new primaries once this many tau decays have been emitted,
    /// finishing any event already in flight (spec.md section 9, "Event-count semantics").
    pub max_taus: Option<u64>,
    /// `--energy-analog`: draw the primary energy directly from the physical spectrum with unit
    /// weight instead of log-uniformly with the Jacobian folded in.
    pub analog_energy: bool,
    /// The requested primary channel (CLI positional `PID`), required for backward mode's
    /// primary acceptance test (spec.md section 4.7, stage 5).
    pub requested_primary: i32,
}

/// Runs `config.events` events (or bins, in grammage mode) under `mode`, returning every record
/// emitted in causal/generation order across the whole run.
///
/// # Errors
///
/// Returns [`Error::General`] if any of the section 4.8 pre-flight checks fail, or if the
/// sampler has no positive weight for a species the run needs to draw.
pub fn run(
    context: &mut Context,
    physics: &Physics,
    mode: RunMode,
    config: &RunConfig,
) -> Result<Vec<EventRecord>> {
    preflight(context, mode, config)?;

    match mode {
        RunMode::Forward => run_forward(context, physics, config),
        RunMode::Backward => run_backward(context, physics, config),
        RunMode::Grammage => Ok(run_grammage(context, config)),
    }
}

/// Pre-flight checks of spec.md section 4.8: all failures are configuration errors, reported
/// before any physics work starts.
fn preflight(context: &Context, mode: RunMode, config: &RunConfig) -> Result<()> {
    context.check_sampler_fresh()?;
    let sampler = context.sampler();

    match mode {
        RunMode::Grammage => {
            let degenerate = (sampler.cos_theta[1] - sampler.cos_theta[0]).abs() < f64::EPSILON;
            if !degenerate && config.events < 2 {
                return Err(Error::General(
                    "grammage mode needs at least 2 bins for a non-degenerate cos(theta) range".to_string(),
                ));
            }
        }
        RunMode::Forward => {
            if context.flags().decay_enabled {
                let neutrino_weight = sampler.neutrino_weight();
                let tau_weight = sampler.weight_of(Species::Tau) + sampler.weight_of(Species::TauBar);
                if neutrino_weight > 0.0 && tau_weight > 0.0 {
                    return Err(Error::General(
                        "forward decay mode cannot mix neutrino and tau species weights in the same sampler"
                            .to_string(),
                    ));
                }
            }
        }
        RunMode::Backward => {
            if !matches!(config.requested_primary, pid::NU_E_BAR | pid::NU_TAU | pid::NU_TAU_BAR) {
                return Err(Error::General(format!(
                    "requested primary {} is not one of nu_e_bar, nu_tau, nu_tau_bar",
                    config.requested_primary
                )));
            }
            if context.flags().decay_enabled && (sampler.altitude[1] - sampler.altitude[0]).abs() < f64::EPSILON {
                return Err(Error::General(
                    "tau-decay backward runs require a non-degenerate altitude range".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Picks a species among those for which `predicate` holds, with probability proportional to its
/// sampler weight. Returns `None` if no matching species has positive weight.
fn pick_species(sampler: &Sampler, prng: &mut Prng, predicate: impl Fn(Species) -> bool) -> Option<Species> {
    let total: f64 = ALL_SPECIES.iter().copied().filter(|&s| predicate(s)).map(|s| sampler.weight_of(s)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut u = prng.uniform01() * total;
    let mut last = None;
    for &species in ALL_SPECIES.iter().filter(|&&s| predicate(s)) {
        last = Some(species);
        let w = sampler.weight_of(species);
        if u < w {
            return Some(species);
        }
        u -= w;
    }
    last
}

/// A primary entering the domain at altitude `-EARTH_RADIUS - 100 km` below the Earth center's
/// antipode, travelling with zenith cosine `cos_theta` (spec.md section 4.8, "start-at-infinity
/// convention"; `examples/original_source/src/danton.c`'s `main()`, which builds the primary at
/// `{0, 0, -EARTH_RADIUS - 1E+05}` with direction `{sqrt(1 - ct^2), 0, ct}`).
fn entry_point(cos_theta: f64) -> ([f64; 3], [f64; 3]) {
    let position = [0.0, 0.0, -EARTH_RADIUS - 1.0e+05];
    let direction = [(1.0 - cos_theta * cos_theta).max(0.0).sqrt(), 0.0, cos_theta];
    (position, direction)
}

/// A point on the virtual detection surface at altitude `z0`, with the arrival direction implied
/// by `elevation` (degrees above the local horizon).
fn detector_point(z0: f64, elevation_deg: f64) -> ([f64; 3], [f64; 3]) {
    let r = EARTH_RADIUS + z0;
    let e = elevation_deg.to_radians();
    ([0.0, 0.0, r], [e.cos(), 0.0, e.sin()])
}

fn run_forward(context: &mut Context, physics: &Physics, config: &RunConfig) -> Result<Vec<EventRecord>> {
    let driver = ForwardDriver::new(physics);
    let mut records = Vec::new();
    let mut tau_decays = 0_u64;

    for eventid in 1..=config.events {
        if config.max_taus.is_some_and(|max| tau_decays >= max) {
            break;
        }

        let sampler = context.sampler().clone();
        let Some(species) = pick_species(&sampler, context.prng_mut(), Species::is_neutrino) else {
            return Err(Error::General("no neutrino species has positive sampler weight".to_string()));
        };
        let cos_theta = Sampler::linear(sampler.cos_theta, 0, 1, false, context.prng_mut());
        let (energy, weight) = sampler.sample_energy(config.analog_energy, context.prng_mut());
        let (position, direction) = entry_point(cos_theta);

        let primary = GenericState::new(species.pdg(), energy, position, direction, weight);
        let event_records = driver.run_event(context, eventid, primary)?;
        tau_decays += event_records.iter().filter(|r| matches!(r, EventRecord::TauPair { .. })).count() as u64;
        records.extend(event_records);
    }

    Ok(records)
}

fn run_backward(context: &mut Context, physics: &Physics, config: &RunConfig) -> Result<Vec<EventRecord>> {
    let driver = BackwardDriver::new(physics);
    let mut records = Vec::new();
    let flux_neutrino = context.flags().flux_neutrino;

    for eventid in 1..=config.events {
        let sampler = context.sampler().clone();
        let z0 = Sampler::linear(sampler.altitude, 0, 1, false, context.prng_mut());
        let elevation = Sampler::linear(sampler.elevation, 0, 1, false, context.prng_mut());
        let (energy, weight) = sampler.sample_energy(config.analog_energy, context.prng_mut());
        let (position, direction) = detector_point(z0, elevation);

        let seed = if flux_neutrino {
            let Some(species) = pick_species(&sampler, context.prng_mut(), Species::is_neutrino) else {
                return Err(Error::General("no neutrino species has positive sampler weight".to_string()));
            };
            BackwardSeed::Neutrino {
                state: GenericState::new(species.pdg(), energy, position, direction, weight),
            }
        } else {
            let Some(species) = pick_species(&sampler, context.prng_mut(), Species::is_tau) else {
                return Err(Error::General("no tau species has positive sampler weight".to_string()));
            };
            BackwardSeed::Tau { state: GenericState::new(species.pdg(), energy, position, direction, weight) }
        };

        let event_records = driver.run_event(context, eventid, seed, config.requested_primary)?;
        records.extend(event_records);
    }

    Ok(records)
}

fn run_grammage(context: &mut Context, config: &RunConfig) -> Vec<EventRecord> {
    let earth = context.earth().clone();
    let sampler = context.sampler().clone();
    let bins = config.events.max(1) as usize;
    let mut records = Vec::with_capacity(bins);

    for i in 0..bins {
        let cos_theta = Sampler::linear(sampler.cos_theta, i, bins, true, context.prng_mut());
        let (mut position, direction) = entry_point(cos_theta);
        let mut grammage = 0.0;

        loop {
            let step = geometry::step(&earth, position, direction);
            if step.shell < 0 {
                break;
            }
            let (density, _) = earth.density(step.shell as usize, step.radius);
            grammage += density * step.length;
            for axis in 0..3 {
                position[axis] += direction[axis] * step.length;
            }
            if geometry::has_escaped_atmosphere(&earth, geometry::norm(position)) {
                break;
            }
        }

        records.push(EventRecord::Grammage { angle: cos_theta, grammage });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModeFlags;
    use crate::prng::Prng;

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
        let dir = std::env::temp_dir().join(format!("danton-run-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("materials.b");
        let physics = Physics::init(&path, &earth).unwrap();
        body(&physics);
        physics.finalize();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn grammage_mode_returns_one_record_per_bin_with_increasing_angle() {
        let mut context =
            Context::with_defaults(EarthModel::new(), Prng::from_seed(1), sampler(), ModeFlags::default()).unwrap();
        let config = RunConfig { events: 3, max_taus: None, analog_energy: false, requested_primary: pid::NU_TAU };
        let records = run_grammage(&mut context, &config);
        assert_eq!(records.len(), 3);
        let angles: Vec<f64> = records
            .iter()
            .map(|r| match r {
                EventRecord::Grammage { angle, .. } => *angle,
                _ => unreachable!(),
            })
            .collect();
        assert!((angles[0] - 0.15).abs() < 1.0e-12);
        assert!((angles[2] - 0.25).abs() < 1.0e-12);
        assert!(records.iter().all(|r| matches!(r, EventRecord::Grammage { grammage, .. } if *grammage > 0.0)));
    }

    #[test]
    fn forward_run_drives_the_requested_event_count() {
        with_physics("forward-count", |physics| {
            let mut context =
                Context::with_defaults(EarthModel::new(), Prng::from_seed(5), sampler(), ModeFlags::default())
                    .unwrap();
            let config =
                RunConfig { events: 2, max_taus: None, analog_energy: false, requested_primary: pid::NU_TAU };
            let records = run(&mut context, physics, RunMode::Forward, &config).unwrap();
            let ancestors = records.iter().filter(|r| matches!(r, EventRecord::Ancestor { .. })).count();
            assert!(ancestors <= 2);
        });
    }

    #[test]
    fn backward_run_rejects_an_unknown_requested_primary() {
        with_physics("backward-bad-primary", |physics| {
            let mut context =
                Context::with_defaults(EarthModel::new(), Prng::from_seed(5), sampler(), ModeFlags::default())
                    .unwrap();
            let config = RunConfig { events: 1, max_taus: None, analog_energy: false, requested_primary: 22 };
            assert!(run(&mut context, physics, RunMode::Backward, &config).is_err());
        });
    }

    #[test]
    fn grammage_mode_with_degenerate_angle_allows_a_single_bin() {
        let mut degenerate_sampler = sampler();
        degenerate_sampler.cos_theta = [0.2, 0.2];
        let context =
            Context::with_defaults(EarthModel::new(), Prng::from_seed(1), degenerate_sampler, ModeFlags::default())
                .unwrap();
        let config = RunConfig { events: 1, max_taus: None, analog_energy: false, requested_primary: pid::NU_TAU };
        assert!(preflight(&context, RunMode::Grammage, &config).is_ok());
    }

    #[test]
    fn grammage_mode_rejects_a_single_bin_over_a_non_degenerate_angle() {
        let mut context =
            Context::with_defaults(EarthModel::new(), Prng::from_seed(1), sampler(), ModeFlags::default()).unwrap();
        let config = RunConfig { events: 1, max_taus: None, analog_energy: false, requested_primary: pid::NU_TAU };
        assert!(preflight(&context, RunMode::Grammage, &config).is_err());
    }
}
