//! Run context: PRNG, sampler, energy cut and mode flags threaded through every event
//! (spec.md section 3, "Context").
//!
//! A [`Context`] is private to a single run: it owns the PRNG stream and borrows the process-wide
//! [`crate::physics::Physics`] handle read-only, mirroring the single-threaded cooperative model
//! of spec.md section 5 ("PRNG state belongs to a single context").

use crate::constants::DEFAULT_ENERGY_CUT;
use crate::earth::EarthModel;
use crate::prng::Prng;
use crate::sampler::Sampler;
use crate::{Error, Result};

/// Mode flags controlling how a [`Context`] drives an event (spec.md section 3).
#[derive(Clone, Copy, Debug, Default)]
pub struct ModeFlags {
    /// Run backward (BMC) instead of forward.
    pub backward: bool,
    /// Allow tau decay (forward mode only; disabled for tau-flux-only runs).
    pub decay_enabled: bool,
    /// Bypass physics and only accumulate grammage.
    pub grammage_only: bool,
    /// Suppress transverse deflection, restoring the original direction after every engine call.
    pub longitudinal_approx: bool,
    /// Track the virtual detection surface crossing instead of stopping at the ground.
    pub flux_neutrino: bool,
    /// Skip the ocean layer, replacing it with rock (`--pem-no-sea`).
    pub dry_sea: bool,
}

impl ModeFlags {
    /// Validates the flag combination (spec.md section 9, Design notes: flux-neutrino and decay
    /// modes are mutually exclusive at the API surface).
    ///
    /// # Errors
    ///
    /// Returns [`Error::General`] if `flux_neutrino` and `decay_enabled` are both set.
    pub fn validate(self) -> Result<()> {
        if self.flux_neutrino && self.decay_enabled {
            return Err(Error::General(
                "flux-neutrino mode and tau-decay mode cannot both be enabled in the same run".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-run state: PRNG, validated sampler, energy cut, mode flags and the Earth model.
pub struct Context {
    earth: EarthModel,
    prng: Prng,
    sampler: Sampler,
    sampler_hash: u64,
    energy_cut: f64,
    flags: ModeFlags,
}

impl Context {
    /// Builds a context from a validated `sampler`, capturing its hash for later staleness checks
    /// (spec.md section 3: "a stable hash ... used at run start").
    ///
    /// # Errors
    ///
    /// Returns [`Error::General`] if `sampler` fails validation or `flags` is an invalid
    /// combination.
    pub fn new(earth: EarthModel, prng: Prng, sampler: Sampler, energy_cut: f64, flags: ModeFlags) -> Result<Self> {
        sampler.validate()?;
        flags.validate()?;
        let sampler_hash = sampler.hash();
        Ok(Self { earth, prng, sampler, sampler_hash, energy_cut, flags })
    }

    /// Builds a context with the default energy cut (spec.md section 4.8, Pre-flight checks).
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_defaults(earth: EarthModel, prng: Prng, sampler: Sampler, flags: ModeFlags) -> Result<Self> {
        Self::new(earth, prng, sampler, DEFAULT_ENERGY_CUT, flags)
    }

    /// The bound Earth model.
    #[must_use]
    pub const fn earth(&self) -> &EarthModel {
        &self.earth
    }

    /// Mutable access to the context's private PRNG.
    pub fn prng_mut(&mut self) -> &mut Prng {
        &mut self.prng
    }

    /// The validated sampler.
    #[must_use]
    pub const fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// The energy cut, in GeV, below which every particle is killed.
    #[must_use]
    pub const fn energy_cut(&self) -> f64 {
        self.energy_cut
    }

    /// The active mode flags.
    #[must_use]
    pub const fn flags(&self) -> ModeFlags {
        self.flags
    }

    /// Re-validates that `self.sampler` has not been mutated since the context was built
    /// (spec.md section 4.8, Pre-flight checks: "sampler present and not stale").
    ///
    /// # Errors
    ///
    /// Returns [`Error::General`] if the sampler's current hash no longer matches the one
    /// captured at construction time.
    pub fn check_sampler_fresh(&self) -> Result<()> {
        if self.sampler.hash() != self.sampler_hash {
            return Err(Error::General(
                "sampler configuration changed after context initialization; rebuild the context".to_string(),
            ));
        }
        Ok(())
    }

    /// Replaces the sampler in place, re-validating it and refreshing the captured hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::General`] if `sampler` fails validation.
    pub fn update_sampler(&mut self, sampler: Sampler) -> Result<()> {
        sampler.validate()?;
        self.sampler_hash = sampler.hash();
        self.sampler = sampler;
        Ok(())
    }
}
