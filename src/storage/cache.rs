//! Optional LRU read-cache decorator over any [`StorageBackend`]
//! (spec.md §4.2): transparent — it changes nothing observable, only
//! how many times the inner backend's bytes get touched for repeated
//! hot reads. Disabled unless a caller explicitly wraps a backend in it.

use super::StorageBackend;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::VecDeque;

struct LruState {
    capacity: usize,
    entries: HashMap<usize, (u64, Vec<u8>)>,
    order: VecDeque<usize>,
}

impl LruState {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, i: usize) -> Option<(u64, Vec<u8>)> {
        if let Some(v) = self.entries.get(&i).cloned() {
            self.touch(i);
            Some(v)
        } else {
            None
        }
    }

    fn put(&mut self, i: usize, value: (u64, Vec<u8>)) {
        if self.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&i) && self.entries.len() >= self.capacity {
            if let Some(evict) = self.order.pop_front() {
                self.entries.remove(&evict);
            }
        }
        self.entries.insert(i, value);
        self.touch(i);
    }

    fn invalidate(&mut self, i: usize) {
        self.entries.remove(&i);
        self.order.retain(|&x| x != i);
    }

    fn touch(&mut self, i: usize) {
        self.order.retain(|&x| x != i);
        self.order.push_back(i);
    }
}

/// Wraps a [`StorageBackend`] with an LRU cache keyed by slot index.
pub struct CachingStorage<S> {
    inner: S,
    cache: Mutex<LruState>,
}

impl<S: StorageBackend> CachingStorage<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruState::new(capacity)),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: StorageBackend> StorageBackend for CachingStorage<S> {
    fn slot_count(&self) -> usize {
        self.inner.slot_count()
    }

    fn read(&self, i: usize) -> Option<(u64, Vec<u8>)> {
        if let Some(v) = self.cache.lock().get(i) {
            return Some(v);
        }
        let result = self.inner.read(i);
        if let Some(ref v) = result {
            self.cache.lock().put(i, v.clone());
        }
        result
    }

    fn write(&mut self, i: usize, fingerprint: u64, payload: &[u8]) -> Result<()> {
        self.inner.write(i, fingerprint, payload)?;
        self.cache.lock().invalidate(i);
        Ok(())
    }

    fn clear(&mut self, i: usize) -> Result<()> {
        self.inner.clear(i)?;
        self.cache.lock().invalidate(i);
        Ok(())
    }

    fn is_empty(&self, i: usize) -> bool {
        self.inner.is_empty(i)
    }

    fn fingerprint_at(&self, i: usize) -> u64 {
        self.inner.fingerprint_at(i)
    }

    fn sync(&self) -> Result<()> {
        self.inner.sync()
    }

    fn is_readonly(&self) -> bool {
        self.inner.is_readonly()
    }

    fn is_optimized(&self) -> bool {
        self.inner.is_optimized()
    }

    fn set_optimized(&mut self, value: bool) -> Result<()> {
        self.inner.set_optimized(value)
    }

    fn generation(&self) -> u64 {
        self.inner.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn cache_is_transparent_to_observable_semantics() {
        let mut c = CachingStorage::new(MemoryStorage::new(8), 4);
        c.write(0, 1, b"a").unwrap();
        assert_eq!(c.read(0), Some((1, b"a".to_vec())));
        // repeated read hits the cache, same result
        assert_eq!(c.read(0), Some((1, b"a".to_vec())));
        c.write(0, 2, b"b").unwrap();
        assert_eq!(c.read(0), Some((2, b"b".to_vec())));
        c.clear(0).unwrap();
        assert!(c.is_empty(0));
    }

    #[test]
    fn eviction_does_not_change_correctness() {
        let mut c = CachingStorage::new(MemoryStorage::new(16), 2);
        for i in 0..8 {
            c.write(i, i as u64, format!("v{i}").as_bytes()).unwrap();
        }
        for i in 0..8 {
            assert_eq!(c.read(i).unwrap().1, format!("v{i}").into_bytes());
        }
    }
}
