//! Stable error taxonomy shared by every layer of the pipeline, down to the C ABI.

crate::eyre_imports!();

use std::fmt;

/// Error kinds surfaced by the build pipeline and the runtime query engine.
///
/// The variants are the stable, wire-level kinds from the design's error
/// taxonomy: callers (including the C ABI) only ever need to match on these,
/// never on the `String` payloads, which exist purely for diagnostics.
#[derive(Debug, Clone)]
pub enum NavError {
    /// A named blob was missing from the [`crate::blob::BlobProvider`].
    NotFound(String),
    /// A read ran past the end of a byte blob.
    Truncated(String),
    /// A format invariant was violated (bad tag, impossible size, ...).
    Corrupt(String),
    /// A tile/world coordinate fell outside the 64x64 grid or the map bounds.
    OutOfRange(String),
    /// A query referenced a tile that has not been loaded.
    NotLoaded(String),
    /// The caller's output buffer was too small; `needed` is the true count.
    TooSmall { needed: usize },
    /// Anything else unexpected; fatal for the operation that produced it.
    Internal(String),
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavError::NotFound(s) => write!(f, "not found: {s}"),
            NavError::Truncated(s) => write!(f, "truncated: {s}"),
            NavError::Corrupt(s) => write!(f, "corrupt: {s}"),
            NavError::OutOfRange(s) => write!(f, "out of range: {s}"),
            NavError::NotLoaded(s) => write!(f, "not loaded: {s}"),
            NavError::TooSmall { needed } => write!(f, "buffer too small, need {needed}"),
            NavError::Internal(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl std::error::Error for NavError {}

impl From<eyre::Report> for NavError {
    fn from(report: eyre::Report) -> Self {
        NavError::Internal(format!("{report:#}"))
    }
}

/// The 8-bit result code exposed across the C ABI (§6/§7). Mirrors `NavError`
/// one-for-one, plus the `Ok` case which `NavError` itself has no need for.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavResult {
    Ok = 0,
    NotFound = 1,
    Truncated = 2,
    Corrupt = 3,
    OutOfRange = 4,
    NotLoaded = 5,
    TooSmall = 6,
    Internal = 7,
}

impl From<&NavError> for NavResult {
    fn from(e: &NavError) -> Self {
        match e {
            NavError::NotFound(_) => NavResult::NotFound,
            NavError::Truncated(_) => NavResult::Truncated,
            NavError::Corrupt(_) => NavResult::Corrupt,
            NavError::OutOfRange(_) => NavResult::OutOfRange,
            NavError::NotLoaded(_) => NavResult::NotLoaded,
            NavError::TooSmall { .. } => NavResult::TooSmall,
            NavError::Internal(_) => NavResult::Internal,
        }
    }
}

pub type NavCoreResult<T> = std::result::Result<T, NavError>;
