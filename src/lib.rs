//! maph: an embeddable, memory-mapped key/value store optimized for
//! sub-microsecond point lookups on small, bounded-size records.
//!
//! A store begins in standard mode (open-addressed linear probing) and
//! can be *optimized* into a minimal perfect hash once its key set is
//! static, giving a guaranteed single probe per lookup. Inserts made
//! after optimization fall back to the probing region automatically
//! (hybrid mode). See [`store::Store`] for the facade most callers want.

pub mod error;
pub mod hasher;
pub mod header;
pub mod journal;
pub mod perfect;
pub mod slot;
pub mod storage;
pub mod store;
pub mod table;

pub use error::{MaphError, Result};
pub use store::{CacheConfig, Stats, Store, StoreConfig};
