//! Storage backends (C2): an array of `num_slots` fixed-size slots,
//! either heap-allocated or memory-mapped from a file.
//!
//! Both variants implement [`StorageBackend`], a small capability trait
//! kept object-safe so the facade can pick a backend at runtime (spec.md
//! §9's guidance to reserve trait objects for the facade boundary and use
//! monomorphized generics for the hot storage↔table path — `Table<H, S>`
//! is generic over `S: StorageBackend`, so the dispatch cost only shows
//! up once, at construction).

pub mod cache;
pub mod file;
pub mod memory;

use crate::error::Result;
use crate::slot;

pub use cache::CachingStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Capability set common to in-memory and file-backed slot arrays.
pub trait StorageBackend {
    /// Number of slots. Immutable for the life of the storage.
    fn slot_count(&self) -> usize;

    /// Read slot `i`. `None` if `i` is out of range or the slot is empty.
    fn read(&self, i: usize) -> Option<(u64, Vec<u8>)>;

    /// Overwrite slot `i`. Fails with `ValueTooLarge` if the payload
    /// exceeds `PAYLOAD_MAX`, or returns an I/O error for out-of-range `i`.
    fn write(&mut self, i: usize, fingerprint: u64, payload: &[u8]) -> Result<()>;

    /// Empty slot `i`.
    fn clear(&mut self, i: usize) -> Result<()>;

    /// `true` iff slot `i`'s most recently committed state is empty.
    fn is_empty(&self, i: usize) -> bool;

    /// The fingerprint stored at slot `i` (0 if empty or out of range).
    fn fingerprint_at(&self, i: usize) -> u64;

    /// Request durability of all prior writes. Fire-and-forget: this may
    /// return before the flush completes (e.g. `MAP_ASYNC`-style msync).
    fn sync(&self) -> Result<()>;

    /// Whether this backend rejects writes (a read-only file mapping).
    fn is_readonly(&self) -> bool {
        false
    }

    /// Header's `is_optimized` flag. `MemoryStorage` has no header, so it
    /// tracks this in an ordinary field instead.
    fn is_optimized(&self) -> bool {
        false
    }

    /// Flip the `is_optimized` flag. A no-op for backends without a
    /// persisted header (there is nothing else for them to track it in
    /// other than the store facade's own `mph` field).
    fn set_optimized(&mut self, _value: bool) -> Result<()> {
        Ok(())
    }

    /// Header's monotonically increasing mutation counter. `MemoryStorage`
    /// has no header and never bumps one, so it stays `0`.
    fn generation(&self) -> u64 {
        0
    }
}

impl<S: StorageBackend + ?Sized> StorageBackend for Box<S> {
    fn slot_count(&self) -> usize {
        (**self).slot_count()
    }

    fn read(&self, i: usize) -> Option<(u64, Vec<u8>)> {
        (**self).read(i)
    }

    fn write(&mut self, i: usize, fingerprint: u64, payload: &[u8]) -> Result<()> {
        (**self).write(i, fingerprint, payload)
    }

    fn clear(&mut self, i: usize) -> Result<()> {
        (**self).clear(i)
    }

    fn is_empty(&self, i: usize) -> bool {
        (**self).is_empty(i)
    }

    fn fingerprint_at(&self, i: usize) -> u64 {
        (**self).fingerprint_at(i)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }

    fn is_readonly(&self) -> bool {
        (**self).is_readonly()
    }

    fn is_optimized(&self) -> bool {
        (**self).is_optimized()
    }

    fn set_optimized(&mut self, value: bool) -> Result<()> {
        (**self).set_optimized(value)
    }

    fn generation(&self) -> u64 {
        (**self).generation()
    }
}

/// Shared bounds-check helper used by both backends.
#[inline]
pub(crate) fn check_index(i: usize, slot_count: usize) -> Result<()> {
    if i >= slot_count {
        return Err(crate::error::MaphError::InvalidFormat(format!(
            "slot index {i} out of range (0..{slot_count})"
        )));
    }
    Ok(())
}

/// Shared `is_empty`/`fingerprint_at` plumbing over a raw slot window.
#[inline]
pub(crate) fn slot_window(bytes: &[u8], i: usize) -> &[u8] {
    &bytes[i * slot::SLOT_SIZE..(i + 1) * slot::SLOT_SIZE]
}

#[inline]
pub(crate) fn slot_window_mut(bytes: &mut [u8], i: usize) -> &mut [u8] {
    &mut bytes[i * slot::SLOT_SIZE..(i + 1) * slot::SLOT_SIZE]
}
