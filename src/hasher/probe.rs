//! Probe-sequence hasher (C3 decorator): bounded linear probing with
//! wraparound over an underlying index hasher.

use super::index::IndexHasher;
use smallvec::SmallVec;

/// Default probe budget, per spec.md §4.3 ("default 10-20").
pub const DEFAULT_MAX_PROBES: usize = 16;

/// Inline capacity for the probe-sequence buffer: most lookups resolve
/// within a handful of probes, so a `SmallVec` avoids a heap allocation
/// on the hot path (mirrors the teacher's own use of `smallvec` for
/// small, usually-inline-sized collections).
pub type ProbeSequence = SmallVec<[usize; 8]>;

/// Decorates an [`IndexHasher`] with a bounded linear-probe sequence.
#[derive(Clone)]
pub struct ProbeHasher<H> {
    inner: H,
    max_probes: usize,
}

impl<H: IndexHasher> ProbeHasher<H> {
    pub fn new(inner: H, max_probes: usize) -> Self {
        Self {
            inner,
            max_probes: max_probes.max(1),
        }
    }

    pub fn max_probes(&self) -> usize {
        self.max_probes
    }

    pub fn fingerprint(&self, key: &[u8]) -> u64 {
        self.inner.fingerprint(key)
    }

    /// Up to `max_probes` distinct slot indices: `(h + k) mod N` for
    /// `k = 0..max_probes-1`. The table is declared full if none of
    /// these indices satisfy the caller (empty, or fingerprint match).
    pub fn probe_sequence(&self, key: &[u8], slot_count: usize) -> ProbeSequence {
        let mut seq = ProbeSequence::new();
        if slot_count == 0 {
            return seq;
        }
        let start = self.inner.index(key, slot_count);
        let probes = self.max_probes.min(slot_count);
        for k in 0..probes {
            seq.push((start + k) % slot_count);
        }
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::index::FnvIndexHasher;

    #[test]
    fn sequence_has_bounded_length_and_wraps() {
        let h = ProbeHasher::new(FnvIndexHasher, 5);
        let seq = h.probe_sequence(b"key", 8);
        assert_eq!(seq.len(), 5);
        // consecutive, modulo wraparound
        for i in 1..seq.len() {
            assert_eq!((seq[i - 1] + 1) % 8, seq[i]);
        }
    }

    #[test]
    fn sequence_is_capped_by_slot_count() {
        let h = ProbeHasher::new(FnvIndexHasher, 100);
        let seq = h.probe_sequence(b"key", 3);
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn empty_table_yields_empty_sequence() {
        let h = ProbeHasher::new(FnvIndexHasher, 10);
        assert!(h.probe_sequence(b"key", 0).is_empty());
    }
}
