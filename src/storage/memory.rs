//! Heap-allocated slot array: no file, no mmap — used for ephemeral
//! stores and for snapshotting during `optimize()`.

use super::{check_index, slot_window, slot_window_mut, StorageBackend};
use crate::error::Result;
use crate::slot::{self, SLOT_SIZE};

pub struct MemoryStorage {
    bytes: Vec<u8>,
    num_slots: usize,
}

impl MemoryStorage {
    pub fn new(num_slots: usize) -> Self {
        Self {
            bytes: vec![0u8; num_slots * SLOT_SIZE],
            num_slots,
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn slot_count(&self) -> usize {
        self.num_slots
    }

    fn read(&self, i: usize) -> Option<(u64, Vec<u8>)> {
        if i >= self.num_slots {
            return None;
        }
        slot::read(slot_window(&self.bytes, i))
    }

    fn write(&mut self, i: usize, fingerprint: u64, payload: &[u8]) -> Result<()> {
        check_index(i, self.num_slots)?;
        slot::write(slot_window_mut(&mut self.bytes, i), fingerprint, payload)
    }

    fn clear(&mut self, i: usize) -> Result<()> {
        check_index(i, self.num_slots)?;
        slot::clear(slot_window_mut(&mut self.bytes, i));
        Ok(())
    }

    fn is_empty(&self, i: usize) -> bool {
        i >= self.num_slots || slot::is_empty(slot_window(&self.bytes, i))
    }

    fn fingerprint_at(&self, i: usize) -> u64 {
        if i >= self.num_slots {
            return 0;
        }
        slot::fingerprint(slot_window(&self.bytes, i))
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
