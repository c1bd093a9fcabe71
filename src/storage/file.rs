//! Memory-mapped, file-backed storage.
//!
//! Follows the teacher's mmap lifecycle (`arena.rs::DurableArena::new`,
//! `mmap_hash.rs::MmapHashIndex::new`): open-or-create the file, `mmap`
//! it shared so every process that opens the same path observes the same
//! bytes, then validate (or initialize) the header in place. Unlike the
//! teacher's arena, this storage never grows — spec.md explicitly places
//! "on-line rehashing that grows the slot array" out of scope.

use super::{check_index, slot_window, slot_window_mut, StorageBackend};
use crate::error::{MaphError, Result};
use crate::header::{HeaderView, HEADER_SIZE};
use crate::slot::{self, SLOT_SIZE};
use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::path::Path;

enum Mapping {
    Mut(MmapMut),
    ReadOnly(Mmap),
}

impl Mapping {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Mapping::Mut(m) => &m[..],
            Mapping::ReadOnly(m) => &m[..],
        }
    }

    fn as_bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Mapping::Mut(m) => Some(&mut m[..]),
            Mapping::ReadOnly(_) => None,
        }
    }
}

pub struct FileStorage {
    mapping: Mapping,
    _file: File,
    num_slots: usize,
    readonly: bool,
}

impl FileStorage {
    /// Create a new store file at `path` with room for `num_slots` slots.
    /// Truncates and rewrites if a file already exists there.
    pub fn create(path: impl AsRef<Path>, num_slots: usize) -> Result<Self> {
        let file_size = (HEADER_SIZE + num_slots * SLOT_SIZE) as u64;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(file_size)?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        HeaderView::init(&mut mmap[..HEADER_SIZE], num_slots as u64, SLOT_SIZE as u64);

        Ok(Self {
            mapping: Mapping::Mut(mmap),
            _file: file,
            num_slots,
            readonly: false,
        })
    }

    /// Open an existing store file. `readonly` maps the file read-only and
    /// every mutating call fails with `PermissionDenied`.
    pub fn open(path: impl AsRef<Path>, readonly: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!readonly)
            .open(path)?;

        let mapping = if readonly {
            let mmap = unsafe { Mmap::map(&file)? };
            Mapping::ReadOnly(mmap)
        } else {
            let mmap = unsafe { MmapMut::map_mut(&file)? };
            Mapping::Mut(mmap)
        };

        let bytes = mapping.as_bytes();
        if bytes.len() < HEADER_SIZE {
            return Err(MaphError::InvalidFormat("file shorter than header".into()));
        }
        // Validate magic/version without requiring mutable access.
        let mut header_copy = bytes[..HEADER_SIZE].to_vec();
        let header = HeaderView::open(&mut header_copy)?;
        let num_slots = header.num_slots() as usize;
        let expected_len = HEADER_SIZE + num_slots * SLOT_SIZE;
        if bytes.len() < expected_len {
            return Err(MaphError::InvalidFormat(format!(
                "file too short: expected at least {expected_len} bytes, found {}",
                bytes.len()
            )));
        }

        Ok(Self {
            mapping,
            _file: file,
            num_slots,
            readonly,
        })
    }

    /// Run `f` with a mutable view over the header bytes.
    pub(crate) fn with_header_mut<T>(&mut self, f: impl FnOnce(&mut HeaderView) -> T) -> Result<T> {
        let bytes = self
            .mapping
            .as_bytes_mut()
            .ok_or(MaphError::PermissionDenied)?;
        let mut header = HeaderView::open(&mut bytes[..HEADER_SIZE])?;
        Ok(f(&mut header))
    }

    pub fn generation(&self) -> u64 {
        let bytes = self.mapping.as_bytes();
        // SAFETY: header bytes were validated at open/create time.
        let mut copy = bytes[..HEADER_SIZE].to_vec();
        HeaderView::open(&mut copy).unwrap().generation()
    }

    pub fn is_optimized(&self) -> bool {
        let bytes = self.mapping.as_bytes();
        let mut copy = bytes[..HEADER_SIZE].to_vec();
        HeaderView::open(&mut copy).unwrap().is_optimized()
    }

    pub fn set_optimized(&mut self, value: bool) -> Result<()> {
        self.with_header_mut(|h| h.set_optimized(value))
    }

    fn all_slot_bytes(&self) -> &[u8] {
        &self.mapping.as_bytes()[HEADER_SIZE..]
    }
}

impl StorageBackend for FileStorage {
    fn slot_count(&self) -> usize {
        self.num_slots
    }

    fn read(&self, i: usize) -> Option<(u64, Vec<u8>)> {
        if i >= self.num_slots {
            return None;
        }
        slot::read(slot_window(self.all_slot_bytes(), i))
    }

    fn write(&mut self, i: usize, fingerprint: u64, payload: &[u8]) -> Result<()> {
        if self.readonly {
            return Err(MaphError::PermissionDenied);
        }
        check_index(i, self.num_slots)?;
        let bytes = self.mapping.as_bytes_mut().ok_or(MaphError::PermissionDenied)?;
        slot::write(slot_window_mut(&mut bytes[HEADER_SIZE..], i), fingerprint, payload)?;
        self.with_header_mut(|h| {
            h.bump_generation();
        })?;
        Ok(())
    }

    fn clear(&mut self, i: usize) -> Result<()> {
        if self.readonly {
            return Err(MaphError::PermissionDenied);
        }
        check_index(i, self.num_slots)?;
        let bytes = self.mapping.as_bytes_mut().ok_or(MaphError::PermissionDenied)?;
        slot::clear(slot_window_mut(&mut bytes[HEADER_SIZE..], i));
        self.with_header_mut(|h| {
            h.bump_generation();
        })?;
        Ok(())
    }

    fn is_empty(&self, i: usize) -> bool {
        i >= self.num_slots || slot::is_empty(slot_window(self.all_slot_bytes(), i))
    }

    fn fingerprint_at(&self, i: usize) -> u64 {
        if i >= self.num_slots {
            return 0;
        }
        slot::fingerprint(slot_window(self.all_slot_bytes(), i))
    }

    fn sync(&self) -> Result<()> {
        match &self.mapping {
            Mapping::Mut(m) => m.flush_async().map_err(MaphError::from),
            Mapping::ReadOnly(_) => Ok(()),
        }
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn is_optimized(&self) -> bool {
        FileStorage::is_optimized(self)
    }

    fn set_optimized(&mut self, value: bool) -> Result<()> {
        FileStorage::set_optimized(self, value)
    }

    fn generation(&self) -> u64 {
        FileStorage::generation(self)
    }
}
