//! FNV-1a, the reference hash used throughout the store.
//!
//! This is hand-rolled rather than pulled from a crate: the algorithm is
//! core subject matter for this spec (spec.md §4.3 names it explicitly as
//! "the reference implementation"), mirroring the original C++
//! `hash_fnv1a` in `perfect_hash_simple_openmp.hpp`, which is likewise
//! inlined rather than imported.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over `data`, seeded so the index hash and the
/// fingerprint hash (two different seeds) are independent of one
/// another even for the same key.
#[inline]
pub fn fnv1a(data: &[u8], seed: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS ^ seed;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Seed used to derive a slot index from a key.
pub const INDEX_SEED: u64 = 0;
/// Seed used to derive the fingerprint stored alongside a slot's payload.
/// Distinct from `INDEX_SEED` so fingerprint collisions are not
/// correlated with index collisions.
pub const FINGERPRINT_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(fnv1a(b"alpha", INDEX_SEED), fnv1a(b"alpha", INDEX_SEED));
    }

    #[test]
    fn seed_changes_output() {
        assert_ne!(fnv1a(b"alpha", INDEX_SEED), fnv1a(b"alpha", FINGERPRINT_SEED));
    }

    #[test]
    fn empty_key_is_well_defined() {
        assert_eq!(fnv1a(b"", 0), FNV_OFFSET_BASIS);
    }
}
