//! File header: the first `slot_size` bytes of a file-backed store.
//!
//! Layout (little-endian, exactly 512 bytes — see the on-disk format in
//! the crate's top-level docs):
//! ```text
//! [ 0.. 4)  magic            u32  0x4D415048 ("MAPH")
//! [ 4.. 8)  format_version   u32
//! [ 8..16)  num_slots        u64
//! [16..24)  slot_size        u64
//! [24..32)  generation       u64 (atomic)
//! [32..64)  flags            bit 0 = is_optimized, rest reserved (zero)
//! [64..512) reserved, zero
//! ```

use crate::error::{MaphError, Result};
use std::sync::atomic::{AtomicU64, Ordering};

pub const MAGIC: u32 = 0x4D41_5048; // "MAPH"
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 512;

const OFF_MAGIC: usize = 0;
const OFF_FORMAT_VERSION: usize = 4;
const OFF_NUM_SLOTS: usize = 8;
const OFF_SLOT_SIZE: usize = 16;
const OFF_GENERATION: usize = 24;
const OFF_FLAGS: usize = 32;

const FLAG_IS_OPTIMIZED: u32 = 1 << 0;

/// A view over the header bytes of a mapped or in-memory store file.
///
/// This does not own the bytes; it borrows a `HEADER_SIZE`-byte slice and
/// reads/writes through it, mirroring the way `storage::file::FileStorage`
/// addresses its mmap rather than copying the header in and out.
pub struct HeaderView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> HeaderView<'a> {
    /// Wrap an existing `HEADER_SIZE`-byte region, validating magic/version.
    pub fn open(bytes: &'a mut [u8]) -> Result<Self> {
        assert!(bytes.len() >= HEADER_SIZE);
        let view = Self { bytes };
        let magic = view.read_u32(OFF_MAGIC);
        if magic != MAGIC {
            return Err(MaphError::InvalidFormat(format!(
                "bad magic: expected {MAGIC:#010x}, found {magic:#010x}"
            )));
        }
        let version = view.read_u32(OFF_FORMAT_VERSION);
        if version != FORMAT_VERSION {
            return Err(MaphError::InvalidFormat(format!(
                "unsupported format version: {version}"
            )));
        }
        Ok(view)
    }

    /// Initialize a fresh header in place (used by `create`).
    pub fn init(bytes: &'a mut [u8], num_slots: u64, slot_size: u64) -> Self {
        assert!(bytes.len() >= HEADER_SIZE);
        bytes[..HEADER_SIZE].fill(0);
        let mut view = Self { bytes };
        view.write_u32(OFF_MAGIC, MAGIC);
        view.write_u32(OFF_FORMAT_VERSION, FORMAT_VERSION);
        view.write_u64(OFF_NUM_SLOTS, num_slots);
        view.write_u64(OFF_SLOT_SIZE, slot_size);
        view.write_u64(OFF_GENERATION, 0);
        view.write_u32(OFF_FLAGS, 0);
        view
    }

    pub fn num_slots(&self) -> u64 {
        self.read_u64(OFF_NUM_SLOTS)
    }

    pub fn slot_size(&self) -> u64 {
        self.read_u64(OFF_SLOT_SIZE)
    }

    pub fn generation(&self) -> u64 {
        self.generation_atomic().load(Ordering::Acquire)
    }

    pub fn bump_generation(&self) -> u64 {
        self.generation_atomic().fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_optimized(&self) -> bool {
        self.read_u32(OFF_FLAGS) & FLAG_IS_OPTIMIZED != 0
    }

    pub fn set_optimized(&mut self, value: bool) {
        let mut flags = self.read_u32(OFF_FLAGS);
        if value {
            flags |= FLAG_IS_OPTIMIZED;
        } else {
            flags &= !FLAG_IS_OPTIMIZED;
        }
        self.write_u32(OFF_FLAGS, flags);
    }

    fn generation_atomic(&self) -> &AtomicU64 {
        let ptr = self.bytes[OFF_GENERATION..OFF_GENERATION + 8].as_ptr() as *const AtomicU64;
        // SAFETY: offset is 8-byte aligned within a 512-byte-aligned mapping
        // (slot_size is a power of two >= 512) and the region is exclusively
        // owned by this header view for the life of the borrow.
        unsafe { &*ptr }
    }

    fn read_u32(&self, off: usize) -> u32 {
        u32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap())
    }

    fn write_u32(&mut self, off: usize, v: u32) {
        self.bytes[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn read_u64(&self, off: usize) -> u64 {
        u64::from_le_bytes(self.bytes[off..off + 8].try_into().unwrap())
    }

    fn write_u64(&mut self, off: usize, v: u64) {
        self.bytes[off..off + 8].copy_from_slice(&v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_open_round_trips() {
        let mut buf = vec![0u8; HEADER_SIZE];
        {
            let mut h = HeaderView::init(&mut buf, 1024, 512);
            assert_eq!(h.num_slots(), 1024);
            assert_eq!(h.slot_size(), 512);
            assert!(!h.is_optimized());
            h.set_optimized(true);
        }
        let h = HeaderView::open(&mut buf).unwrap();
        assert_eq!(h.num_slots(), 1024);
        assert!(h.is_optimized());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        assert!(HeaderView::open(&mut buf).is_err());
    }

    #[test]
    fn generation_is_monotonic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        let h = HeaderView::init(&mut buf, 8, 512);
        assert_eq!(h.generation(), 0);
        assert_eq!(h.bump_generation(), 1);
        assert_eq!(h.bump_generation(), 2);
        assert_eq!(h.generation(), 2);
    }
}
