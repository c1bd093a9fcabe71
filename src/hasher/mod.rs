//! Hasher (C3): maps a key to a slot index, or a bounded probe sequence
//! of indices.

pub mod fnv;
pub mod index;
pub mod probe;

pub use index::{FnvIndexHasher, IndexHasher};
pub use probe::{ProbeHasher, ProbeSequence, DEFAULT_MAX_PROBES};
