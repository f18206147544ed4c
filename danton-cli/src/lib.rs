//! `danton-cli`: the `danton` front-end binary. Parses the flat CLI surface of spec.md section 6,
//! builds a [`danton::Context`] and [`danton::physics::Physics`] handle from it, runs the
//! requested number of events through [`danton::run`], and writes the emitted records to a
//! fixed-width text sink.
//!
//! Thin by design: all physics lives in the `danton` library; this crate only owns argument
//! parsing, output formatting and the process exit code, mirroring how `pineappl_cli` wraps
//! `pineappl`.

#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![allow(clippy::struct_excessive_bools)]

pub mod output;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use danton::context::ModeFlags;
use danton::pid;
use danton::prng::Prng;
use danton::run::{RunConfig, RunMode};
use danton::sampler::Sampler;
use danton::{physics::Physics, Context};
use git_version::git_version;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line options of the `danton` front-end (spec.md section 6).
#[derive(Parser)]
#[command(
    author,
    about = "Simulate tau leptons produced by ultra-high-energy neutrinos crossing the Earth",
    name = "danton",
    version = git_version!(args = ["--always", "--dirty", "--long", "--tags"], cargo_prefix = "", fallback = "unknown")
)]
pub struct Opts {
    /// Primary neutrino PDG code: -12 (nu_e_bar), 16 (nu_tau) or -16 (nu_tau_bar). Ignored (and
    /// optional) in `--grammage` mode, which scans geometry only.
    #[arg(value_name = "PID")]
    pub pid: Option<i32>,

    /// Fixes cos(theta) to a single value instead of sampling the `[min, max]` range.
    #[arg(short = 'c', long)]
    pub cos_theta: Option<f64>,
    /// Lower bound of the sampled cos(theta) range.
    #[arg(long, default_value_t = 0.15)]
    pub cos_theta_min: f64,
    /// Upper bound of the sampled cos(theta) range.
    #[arg(long, default_value_t = 0.25)]
    pub cos_theta_max: f64,

    /// Fixes the primary energy to a single value (GeV) instead of sampling `[min, max]`.
    #[arg(short = 'e', long)]
    pub energy: Option<f64>,
    /// Lower bound of the sampled energy range, in GeV.
    #[arg(long, default_value_t = 1.0e+07)]
    pub energy_min: f64,
    /// Upper bound of the sampled energy range, in GeV.
    #[arg(long, default_value_t = 1.0e+12)]
    pub energy_max: f64,
    /// Draw the primary energy directly from the physical 1/E^2 spectrum (unit weight) instead of
    /// log-uniformly with the Jacobian folded into the event weight.
    #[arg(long)]
    pub energy_analog: bool,
    /// Energy, in GeV, below which every particle is killed.
    #[arg(long, default_value_t = 1.0e+03)]
    pub energy_cut: f64,

    /// Number of events to simulate (decay mode) or grammage grid bins to scan (`--grammage`).
    /// Defaults to 10000 (decay mode) or 1001 (grammage mode).
    #[arg(short = 'n')]
    pub events: Option<u64>,

    /// Replace the ocean shell with a copy of the uppermost rock layer.
    #[arg(long)]
    pub pem_no_sea: bool,

    /// Stop driving new primaries once this many tau decays have been emitted (finishing any
    /// event already in flight).
    #[arg(short = 't', long)]
    pub taus: Option<u64>,

    /// Append to the output file instead of truncating it; suppresses the header if the file
    /// already exists.
    #[arg(long)]
    pub append: bool,

    /// Scan grammage along sampled trajectories instead of running the physics.
    #[arg(long)]
    pub grammage: bool,

    /// Write results to FILE instead of stdout.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Unused in this build: the neutrino engine is a self-contained parametrization rather than
    /// an external PDF grid consumer. Accepted for command-line compatibility with spec.md
    /// section 6; see DESIGN.md.
    #[arg(long, value_name = "FILE")]
    pub pdf_file: Option<PathBuf>,
}

impl Opts {
    /// Builds the validated [`Sampler`] and decay-mode flag this run exercises, applying the
    /// point-vs-range and mode-dependent defaulting rules of `examples/original_source/src/danton.c`
    /// `main()` (spec.md section 6 leaves these implicit).
    fn sampler_and_mode(&self) -> Result<(Sampler, bool)> {
        let theta_interval = self.cos_theta.is_none();
        let (cos_theta_min, cos_theta_max) =
            self.cos_theta.map_or((self.cos_theta_min, self.cos_theta_max), |c| (c, c));
        if !(0.0..=1.0).contains(&cos_theta_min) || (theta_interval && !(cos_theta_min..=1.0).contains(&cos_theta_max))
        {
            bail!("inconsistent cos(theta) value(s)");
        }

        let energy_spectrum = self.energy.is_none();
        let (energy_min, energy_max) = self.energy.map_or((self.energy_min, self.energy_max), |e| (e, e));
        if self.energy_cut < 100.0 || energy_min < 100.0 {
            bail!("energies must be at least 100 GeV");
        }
        if energy_spectrum && energy_max <= energy_min {
            bail!("inconsistent energy range");
        }

        // A fixed point energy is numerically safe under analog sampling (it degenerates to the
        // point with unit weight) but not under the log-uniform Jacobian, which divides by the
        // (zero) range width.
        let analog = self.energy_analog || !energy_spectrum;

        let weights = species_weights(self.pid);
        let sampler = Sampler {
            altitude: [0.0, 0.0],
            cos_theta: [cos_theta_min, cos_theta_max],
            elevation: [0.0, 0.0],
            energy: [energy_min, energy_max],
            weights,
        };
        Ok((sampler, analog))
    }

    /// Number of events/bins to run, applying the decay-vs-grammage defaulting and the
    /// point-cos(theta)-collapses-grammage-to-one-bin rule.
    fn event_count(&self, grammage_mode: bool) -> Result<u64> {
        let mut n = self.events.unwrap_or(if grammage_mode { 1001 } else { 10000 });
        if grammage_mode && self.cos_theta.is_some() {
            n = 1;
        } else if grammage_mode && n < 2 {
            bail!("number of bins must be 2 or more");
        }
        Ok(n)
    }
}

/// Builds the per-species weight vector for a single requested primary (spec.md section 6:
/// `PID` selects exactly one of the three tau-producing primaries).
fn species_weights(requested: Option<i32>) -> [f64; 8] {
    use danton::pid::{Species, ALL_SPECIES};
    let requested = requested.unwrap_or(pid::NU_TAU);
    let mut weights = [0.0; 8];
    if let Some(index) = ALL_SPECIES.iter().position(|&s| Species::from_pdg(requested) == Some(s)) {
        weights[index] = 1.0;
    }
    weights
}

/// Runs the front-end end-to-end: parses no arguments of its own (the caller already has
/// `opts`), builds the physics handle and context, drives the configured number of events, and
/// writes the records to the requested sink.
///
/// # Errors
///
/// Returns an error if the options are inconsistent, the sampler fails validation, the physics
/// handle cannot be initialized, or the output file cannot be opened.
pub fn execute(opts: &Opts) -> Result<ExitCode> {
    let grammage_mode = opts.grammage;
    let (mut sampler, analog) = opts.sampler_and_mode()?;
    let events = opts.event_count(grammage_mode)?;

    let requested_primary = if grammage_mode {
        pid::NU_TAU
    } else {
        opts.pid.with_context(|| "a primary PID is required outside of --grammage mode")?
    };
    if !grammage_mode && !matches!(requested_primary, pid::NU_E_BAR | pid::NU_TAU | pid::NU_TAU_BAR) {
        bail!("invalid neutrino PID: must be one of -12, 16, -16");
    }
    if grammage_mode {
        // The scan never drives physics; only the energy-range validation rules apply.
        sampler.weights = species_weights(Some(pid::NU_TAU));
    }

    let earth = danton::earth::EarthModel::new().with_pem_no_sea(opts.pem_no_sea);
    let prng = Prng::from_os_entropy().with_context(|| "could not seed the PRNG from OS entropy")?;
    let flags = ModeFlags { decay_enabled: !grammage_mode, grammage_only: grammage_mode, ..ModeFlags::default() };
    let mut context = Context::new(earth.clone(), prng, sampler, opts.energy_cut, flags).map_err(anyhow::Error::from)?;

    let cache_path = PathBuf::from("materials.b");
    let physics = Physics::init(&cache_path, &earth).map_err(anyhow::Error::from)?;

    let mode = if grammage_mode { RunMode::Grammage } else { RunMode::Forward };
    let config = RunConfig { events, max_taus: opts.taus, analog_energy: analog, requested_primary };

    let records = danton::run(&mut context, &physics, mode, &config).map_err(anyhow::Error::from);
    physics.finalize();
    let records = records?;

    let mut sink = output::Sink::open(opts.output_file.as_deref(), opts.append)
        .with_context(|| "could not open the output file")?;
    sink.write_header(grammage_mode).with_context(|| "could not write the output header")?;
    for record in &records {
        sink.write_record(record).with_context(|| "could not write a record")?;
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Opts::command().debug_assert();
    }

    #[test]
    fn point_cos_theta_collapses_grammage_to_one_bin() {
        let opts = Opts::parse_from(["danton", "--grammage", "-c", "0.2"]);
        assert_eq!(opts.event_count(true).unwrap(), 1);
    }

    #[test]
    fn default_event_counts_differ_by_mode() {
        let decay = Opts::parse_from(["danton", "16"]);
        assert_eq!(decay.event_count(false).unwrap(), 10_000);
        let grammage = Opts::parse_from(["danton", "--grammage"]);
        assert_eq!(grammage.event_count(true).unwrap(), 1001);
    }

    #[test]
    fn single_bin_grammage_without_point_angle_is_rejected() {
        let opts = Opts::parse_from(["danton", "--grammage", "-n", "1"]);
        assert!(opts.event_count(true).is_err());
    }

    #[test]
    fn inconsistent_cos_theta_is_rejected() {
        let opts = Opts::parse_from(["danton", "16", "--cos-theta-min", "0.5", "--cos-theta-max", "0.2"]);
        assert!(opts.sampler_and_mode().is_err());
    }
}
