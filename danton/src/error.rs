//! Crate-wide error type.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration or validation error that originates in this crate, for example a stale
    /// sampler hash or a malformed phase-space range.
    #[error("{0}")]
    General(String),
    /// An error that does not originate from this crate: I/O failures, cache (de)serialization,
    /// or a downstream transport-engine failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
