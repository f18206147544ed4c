//! Process-wide physics handle: the engines, held as a read-only singleton once initialized
//! (spec.md section 3, "Process-wide physics handle"; section 7, "Process-wide physics handle").
//!
//! The handle owns the three engine trait objects plus the lepton engine's compiled material
//! cache, persisted to `materials.b` the way the teacher crate persists grid interpolation tables:
//! with `bincode`, loaded if present and otherwise rebuilt from scratch and written back out.

use crate::earth::EarthModel;
use crate::engines::{AlouetteLike, EntLike, PumasLike};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// The lepton engine's compiled material tables, as persisted in `materials.b`. The teacher
/// reimplementation keeps this table format intentionally opaque to the rest of the crate: it is
/// produced and consumed only by [`MaterialCache::rebuild`] and `bincode`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MaterialCache {
    /// One `(Z, A)` entry per Earth shell, duplicated here (rather than re-read from the live
    /// [`EarthModel`] on every lookup) so the cache file is self-contained and its staleness
    /// against a changed Earth model can be checked cheaply.
    shells: Vec<(f64, f64)>,
}

impl MaterialCache {
    /// Builds a cache from `earth`'s current shell composition.
    #[must_use]
    pub fn rebuild(earth: &EarthModel) -> Self {
        let shells = (0..earth.len()).map(|i| (earth.shell(i).z(), earth.shell(i).a())).collect();
        Self { shells }
    }

    /// Whether this cache's composition matches `earth`'s current one.
    #[must_use]
    pub fn matches(&self, earth: &EarthModel) -> bool {
        self.shells.len() == earth.len()
            && self
                .shells
                .iter()
                .enumerate()
                .all(|(i, &(z, a))| (z, a) == (earth.shell(i).z(), earth.shell(i).a()))
    }

    /// Loads a cache previously written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the file cannot be opened or deserialized.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(anyhow::Error::from)?;
        let cache = bincode::deserialize_from(BufReader::new(file)).map_err(anyhow::Error::from)?;
        Ok(cache)
    }

    /// Writes this cache to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the file cannot be created or serialized.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(anyhow::Error::from)?;
        bincode::serialize_into(BufWriter::new(file), self).map_err(anyhow::Error::from)?;
        Ok(())
    }

    /// Loads the cache at `path` if present and still valid for `earth`, otherwise rebuilds it
    /// and writes it back out (spec.md section 3, "Persisted state").
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if an existing cache file is present but unreadable, or if the
    /// rebuilt cache cannot be written back to `path`.
    pub fn load_or_rebuild(path: &Path, earth: &EarthModel) -> Result<Self> {
        if path.exists() {
            let cache = Self::load(path)?;
            if cache.matches(earth) {
                return Ok(cache);
            }
        }
        let cache = Self::rebuild(earth);
        cache.save(path)?;
        Ok(cache)
    }
}

/// Guards against concurrent or re-entrant initialization of the process-wide physics handle
/// (spec.md Design notes, "Process-wide physics handle": "Forbid re-initialization without
/// finalize").
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Serializes test access to the process-wide [`INITIALIZED`] flag across this crate's whole test
/// binary (unit tests in several modules exercise [`Physics::init`]/[`Physics::finalize`], and the
/// flag is a single process-wide static regardless of which module touches it).
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// The process-wide, read-only-after-init physics handle: the three transport/decay engines plus
/// the lepton engine's material cache.
pub struct Physics {
    neutrino_engine: EntLike,
    lepton_engine: PumasLike,
    decay_sampler: AlouetteLike,
    materials: MaterialCache,
}

impl Physics {
    /// Initializes the process-wide physics handle, loading or rebuilding the material cache at
    /// `cache_path` against `earth`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::General`] if the handle is already initialized, or [`Error::Other`] if
    /// the material cache cannot be loaded, rebuilt, or persisted.
    pub fn init(cache_path: &Path, earth: &EarthModel) -> Result<Self> {
        if INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::General(
                "the physics handle is already initialized; call finalize() first".to_string(),
            ));
        }
        let materials = MaterialCache::load_or_rebuild(cache_path, earth).inspect_err(|_| {
            INITIALIZED.store(false, Ordering::SeqCst);
        })?;
        Ok(Self { neutrino_engine: EntLike::new(), lepton_engine: PumasLike::new(), decay_sampler: AlouetteLike::new(), materials })
    }

    /// Tears down the handle symmetrically with [`Self::init`], allowing a later re-initialization.
    pub fn finalize(self) {
        INITIALIZED.store(false, Ordering::SeqCst);
        drop(self);
    }

    /// The neutrino transport engine.
    #[must_use]
    pub const fn neutrino_engine(&self) -> &EntLike {
        &self.neutrino_engine
    }

    /// The charged-lepton transport engine.
    #[must_use]
    pub const fn lepton_engine(&self) -> &PumasLike {
        &self.lepton_engine
    }

    /// The tau decay sampler.
    #[must_use]
    pub const fn decay_sampler(&self) -> &AlouetteLike {
        &self.decay_sampler
    }

    /// The loaded material cache.
    #[must_use]
    pub const fn materials(&self) -> &MaterialCache {
        &self.materials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_finalize_allows_reinitialization() {
        let _guard = TEST_LOCK.lock().unwrap();
        let dir = std::env::temp_dir().join(format!("danton-test-materials-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("materials.b");
        let earth = EarthModel::new();

        let physics = Physics::init(&path, &earth).expect("first init succeeds");
        physics.finalize();

        let physics2 = Physics::init(&path, &earth).expect("re-init after finalize succeeds");
        physics2.finalize();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reinitializing_without_finalize_is_rejected() {
        let _guard = TEST_LOCK.lock().unwrap();
        let dir = std::env::temp_dir().join(format!("danton-test-materials-reject-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("materials.b");
        let earth = EarthModel::new();

        let physics = Physics::init(&path, &earth).expect("first init succeeds");
        assert!(Physics::init(&path, &earth).is_err());
        physics.finalize();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cache_roundtrips_through_bincode() {
        let earth = EarthModel::new();
        let cache = MaterialCache::rebuild(&earth);
        let dir = std::env::temp_dir().join(format!("danton-test-cache-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("materials.b");
        cache.save(&path).unwrap();
        let loaded = MaterialCache::load(&path).unwrap();
        assert_eq!(cache, loaded);
        assert!(loaded.matches(&earth));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
