//! Minimal perfect hasher (C4): given a finite key set `S`, produce an
//! immutable artifact mapping every member to a unique index in
//! `[0, |S|)`, and rejecting non-members with high probability via a
//! 64-bit fingerprint check.
//!
//! One algorithmic family is implemented: bucketed-fingerprint
//! (BBHash-style) construction, in [`bbhash`]. [`builder`] hosts the
//! shared builder state machine (`Collecting -> Building ->
//! Built|Failed`) described in spec.md §4.4.

pub mod bbhash;
pub mod builder;

pub use bbhash::BbHash;
pub use builder::{BbHashBuilder, BuilderState};

use crate::error::Result;

/// Memory/compression statistics for a built artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub memory_bytes: usize,
    pub bits_per_key: f64,
    pub key_count: usize,
}

/// The query-time contract every MPH family implements.
pub trait PerfectHasher: Sized {
    /// For members of the built key set, a unique index in `[0, n)`.
    /// For non-members, `None` with false-positive probability bounded
    /// by the fingerprint width (spec.md §4.4: ~2^-64).
    fn slot_for(&self, key: &[u8]) -> Option<usize>;

    /// Equivalent to `slot_for(key).is_some()`.
    fn is_perfect_for(&self, key: &[u8]) -> bool {
        self.slot_for(key).is_some()
    }

    fn key_count(&self) -> usize;

    /// Size of the co-domain — always equal to `key_count()` for a
    /// minimal perfect hash.
    fn max_slots(&self) -> usize {
        self.key_count()
    }

    fn statistics(&self) -> Statistics;

    fn serialize(&self) -> Result<Vec<u8>>;
    fn deserialize(bytes: &[u8]) -> Result<Self>;
}
