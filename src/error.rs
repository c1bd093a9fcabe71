//! Error taxonomy for the store.
//!
//! No sentinel values are embedded in payloads; every fallible operation
//! returns one of these variants. Per-operation errors never leave the
//! store in a partially-mutated state (strong exception safety) — see the
//! module docs on `table` and `store` for where each variant is raised.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MaphError>;

#[derive(Debug)]
pub enum MaphError {
    /// Backing-resource failure: create, open, map, write, flush.
    Io(std::io::Error),
    /// Header magic/version mismatch, or a corrupt MPH artifact.
    InvalidFormat(String),
    /// `get`/`remove` of an absent key.
    KeyNotFound,
    /// Probe sequence exhausted on `set`, or `optimize` would exceed `num_slots`.
    TableFull,
    /// Payload exceeds `PAYLOAD_MAX`.
    ValueTooLarge { len: usize, max: usize },
    /// Mutation attempted on a read-only store.
    PermissionDenied,
    /// The MPH builder could not construct an artifact within its configured attempts.
    OptimizationFailed(String),
}

impl fmt::Display for MaphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaphError::Io(e) => write!(f, "io error: {e}"),
            MaphError::InvalidFormat(msg) => write!(f, "invalid format: {msg}"),
            MaphError::KeyNotFound => write!(f, "key not found"),
            MaphError::TableFull => write!(f, "table full"),
            MaphError::ValueTooLarge { len, max } => {
                write!(f, "value too large: {len} bytes exceeds max of {max}")
            }
            MaphError::PermissionDenied => write!(f, "permission denied: store is read-only"),
            MaphError::OptimizationFailed(msg) => write!(f, "optimization failed: {msg}"),
        }
    }
}

impl std::error::Error for MaphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaphError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MaphError {
    fn from(e: std::io::Error) -> Self {
        MaphError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for MaphError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        MaphError::InvalidFormat(e.to_string())
    }
}
