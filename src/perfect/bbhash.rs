//! Bucketed-fingerprint (BBHash-style) minimal perfect hash.
//!
//! Construction iteratively places keys into a bit vector sized
//! `ceil(gamma * remaining)`; a bit "belongs" to a key iff it is the
//! *only* key in the current level whose hash lands there. Keys that
//! collide fall through to the next, smaller level. A key's final slot
//! is the cumulative rank of its claimed bit across all prior levels —
//! this makes the whole structure a *minimal* perfect hash: the
//! codomain is exactly `[0, n)`.
//!
//! Unlike `perfect_hash_simple_openmp.hpp`'s `SimplePerfectHash` (which
//! keeps a full `key_hashes_` array alongside its open-addressed table —
//! the "known repository defect" spec.md §4.4 calls out), this artifact
//! keeps only one `u64` fingerprint per *final slot*, not per original
//! key lookup path, and nothing that lets a non-member be reconstructed.

use super::{PerfectHasher, Statistics};
use crate::error::{MaphError, Result};
use crate::hasher::fnv::{fnv1a, FINGERPRINT_SEED};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Level {
    pub(super) seed: u64,
    /// Number of meaningful bits (<= words.len() * 64).
    pub(super) size: usize,
    pub(super) words: Vec<u64>,
    /// `rank_prefix[i]` = popcount of `words[0..i]`.
    pub(super) rank_prefix: Vec<u32>,
    /// Number of keys already placed in earlier levels.
    pub(super) offset: usize,
}

impl Level {
    fn bit(&self, pos: usize) -> bool {
        (self.words[pos / 64] >> (pos % 64)) & 1 != 0
    }

    fn rank(&self, pos: usize) -> usize {
        let word_idx = pos / 64;
        let bit_idx = pos % 64;
        let prefix = self.rank_prefix[word_idx] as usize;
        let mask = if bit_idx == 0 {
            0
        } else {
            (1u64 << bit_idx) - 1
        };
        prefix + (self.words[word_idx] & mask).count_ones() as usize
    }

    fn memory_bytes(&self) -> usize {
        self.words.len() * 8 + self.rank_prefix.len() * 4 + std::mem::size_of::<Level>()
    }
}

/// An immutable, queryable minimal perfect hash over a fixed key set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbHash {
    pub(super) num_keys: usize,
    pub(super) levels: Vec<Level>,
    /// One fingerprint per final slot index.
    pub(super) fingerprints: Vec<u64>,
}

impl BbHash {
    pub(super) fn empty() -> Self {
        Self {
            num_keys: 0,
            levels: Vec::new(),
            fingerprints: Vec::new(),
        }
    }
}

impl PerfectHasher for BbHash {
    fn slot_for(&self, key: &[u8]) -> Option<usize> {
        if self.num_keys == 0 {
            return None;
        }
        for level in &self.levels {
            let pos = (fnv1a(key, level.seed) as usize) % level.size;
            if level.bit(pos) {
                let slot = level.offset + level.rank(pos);
                if slot < self.num_keys && self.fingerprints[slot] == fnv1a(key, FINGERPRINT_SEED) {
                    return Some(slot);
                }
                return None;
            }
        }
        None
    }

    fn key_count(&self) -> usize {
        self.num_keys
    }

    fn statistics(&self) -> Statistics {
        let memory_bytes = self.levels.iter().map(Level::memory_bytes).sum::<usize>()
            + self.fingerprints.len() * 8
            + std::mem::size_of::<Self>();
        let bits_per_key = if self.num_keys == 0 {
            0.0
        } else {
            (memory_bytes * 8) as f64 / self.num_keys as f64
        };
        Statistics {
            memory_bytes,
            bits_per_key,
            key_count: self.num_keys,
        }
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| MaphError::InvalidFormat(e.to_string()))
    }
}

/// Pure construction function: same `(keys, seed, gamma, max_levels)` in,
/// bit-identical `BbHash` out. Keys are assumed already deduplicated.
pub(super) fn build(
    keys: &[Vec<u8>],
    seed: u64,
    gamma: f64,
    max_levels: usize,
) -> Result<BbHash> {
    if keys.is_empty() {
        return Ok(BbHash::empty());
    }
    let n = keys.len();
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut levels: Vec<Level> = Vec::new();
    let mut slot_of: Vec<Option<usize>> = vec![None; n];
    let mut placed = 0usize;

    while !remaining.is_empty() {
        if levels.len() >= max_levels {
            return Err(MaphError::OptimizationFailed(format!(
                "exceeded {max_levels} levels with {} keys unresolved",
                remaining.len()
            )));
        }
        let level_idx = levels.len() as u64;
        let level_seed = seed ^ (0x9E37_79B9_7F4A_7C15u64.wrapping_mul(level_idx + 1));
        let level_size = ((remaining.len() as f64 * gamma).ceil() as usize).max(1);

        let mut hits = vec![0u8; level_size];
        let mut positions = vec![0usize; remaining.len()];
        for (i, &key_idx) in remaining.iter().enumerate() {
            let pos = (fnv1a(&keys[key_idx], level_seed) as usize) % level_size;
            positions[i] = pos;
            hits[pos] = hits[pos].saturating_add(1);
        }

        let word_count = (level_size + 63) / 64;
        let mut words = vec![0u64; word_count];
        for (pos, &h) in hits.iter().enumerate() {
            if h == 1 {
                words[pos / 64] |= 1u64 << (pos % 64);
            }
        }
        let mut rank_prefix = vec![0u32; word_count];
        let mut running = 0u32;
        for (i, w) in words.iter().enumerate() {
            rank_prefix[i] = running;
            running += w.count_ones();
        }

        let mut next_remaining = Vec::new();
        for (i, &key_idx) in remaining.iter().enumerate() {
            let pos = positions[i];
            if hits[pos] == 1 {
                let word_idx = pos / 64;
                let bit_idx = pos % 64;
                let mask = if bit_idx == 0 {
                    0
                } else {
                    (1u64 << bit_idx) - 1
                };
                let rank = rank_prefix[word_idx] as usize
                    + (words[word_idx] & mask).count_ones() as usize;
                slot_of[key_idx] = Some(placed + rank);
            } else {
                next_remaining.push(key_idx);
            }
        }

        let placed_this_level = running as usize;
        levels.push(Level {
            seed: level_seed,
            size: level_size,
            words,
            rank_prefix,
            offset: placed,
        });
        placed += placed_this_level;
        remaining = next_remaining;
    }

    debug_assert_eq!(placed, n);
    let mut fingerprints = vec![0u64; n];
    for (key_idx, slot) in slot_of.iter().enumerate() {
        let slot = slot.expect("every key must be placed by the loop above");
        fingerprints[slot] = fnv1a(&keys[key_idx], FINGERPRINT_SEED);
    }

    Ok(BbHash {
        num_keys: n,
        levels,
        fingerprints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("key_{i}").into_bytes()).collect()
    }

    #[test]
    fn builds_minimal_perfect_hash() {
        let ks = keys(1000);
        let mph = build(&ks, 42, 2.0, 64).unwrap();
        assert_eq!(mph.key_count(), 1000);
        let mut seen = vec![false; 1000];
        for k in &ks {
            let slot = mph.slot_for(k).expect("member must resolve");
            assert!(slot < 1000);
            assert!(!seen[slot], "slot {slot} claimed twice");
            seen[slot] = true;
        }
        assert!(seen.iter().all(|&b| b));
    }

    #[test]
    fn rejects_non_members_with_high_probability() {
        let ks = keys(500);
        let mph = build(&ks, 7, 2.0, 64).unwrap();
        let mut false_positives = 0;
        for i in 0..10_000 {
            let probe = format!("not_a_member_{i}").into_bytes();
            if mph.is_perfect_for(&probe) {
                false_positives += 1;
            }
        }
        assert!(
            false_positives < 10,
            "expected near-zero false positives, got {false_positives}"
        );
    }

    #[test]
    fn serialize_round_trips() {
        let ks = keys(200);
        let mph = build(&ks, 1, 2.0, 64).unwrap();
        let bytes = mph.serialize().unwrap();
        let restored = BbHash::deserialize(&bytes).unwrap();
        for k in &ks {
            assert_eq!(mph.slot_for(k), restored.slot_for(k));
        }
    }

    #[test]
    fn deterministic_given_same_inputs() {
        let ks = keys(300);
        let a = build(&ks, 99, 2.0, 64).unwrap();
        let b = build(&ks, 99, 2.0, 64).unwrap();
        assert_eq!(a.serialize().unwrap(), b.serialize().unwrap());
    }

    #[test]
    fn empty_key_set_is_well_defined() {
        let mph = build(&[], 0, 2.0, 64).unwrap();
        assert_eq!(mph.key_count(), 0);
        assert!(!mph.is_perfect_for(b"anything"));
    }
}
