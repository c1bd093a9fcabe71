//! Store facade (C7): lifecycle management over a table, wiring storage,
//! hasher, journal, and an optional minimal perfect hash together behind
//! `create`/`open`/`get`/`set`/`remove`/`optimize`/`stats`/`sync`/`close`
//! (spec.md §4.7).
//!
//! `parking_lot::RwLock` serializes the mutable path the way the
//! teacher's `mmap_hash.rs` wraps its index in `RwLock<MmapHashIndex>` —
//! a read lock for `get`, a write lock for `set`/`remove`/`optimize`.
//! Per-slot concurrency is still the seqlock protocol in `slot`; this
//! lock only orders writers against each other and against `optimize`'s
//! exclusive rewrite.

use crate::error::{MaphError, Result};
use crate::hasher::{FnvIndexHasher, ProbeHasher, DEFAULT_MAX_PROBES};
use crate::journal::Journal;
use crate::perfect::{BbHash, BbHashBuilder, PerfectHasher};
use crate::slot::PAYLOAD_MAX;
use crate::storage::{CachingStorage, FileStorage, MemoryStorage, StorageBackend};
use crate::table::{Table, TableStats};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

const MPH_MAGIC: [u8; 8] = *b"MAPHMPH\0";

/// Optional read-cache tuning, attached via [`StoreConfig::with_cache`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    pub capacity: usize,
}

/// Consuming-builder configuration for [`Store::create`], modeled on the
/// teacher's `WalConfig`/`TxnConfig` pattern (`wal/mod.rs`, `txn/mod.rs`):
/// sensible defaults via `Default`, chained `with_*` setters.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    num_slots: usize,
    max_probes: usize,
    mph_seed: u64,
    mph_gamma: f64,
    mph_max_levels: usize,
    cache: Option<CacheConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            num_slots: 1024,
            max_probes: DEFAULT_MAX_PROBES,
            mph_seed: 0,
            mph_gamma: 2.0,
            mph_max_levels: crate::perfect::builder::DEFAULT_MAX_LEVELS,
            cache: None,
        }
    }
}

impl StoreConfig {
    pub fn new(num_slots: usize) -> Self {
        Self {
            num_slots,
            ..Default::default()
        }
    }

    pub fn with_max_probes(mut self, max_probes: usize) -> Self {
        self.max_probes = max_probes;
        self
    }

    pub fn with_mph_seed(mut self, seed: u64) -> Self {
        self.mph_seed = seed;
        self
    }

    pub fn with_mph_gamma(mut self, gamma: f64) -> Self {
        self.mph_gamma = gamma;
        self
    }

    pub fn with_mph_max_levels(mut self, max_levels: usize) -> Self {
        self.mph_max_levels = max_levels;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }
}

/// Snapshot returned by [`Store::stats`] (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    pub used_slots: usize,
    pub total_slots: usize,
    pub load_factor: f64,
    pub generation: u64,
    pub is_optimized: bool,
    pub mph_key_count: usize,
    pub journal_entries: usize,
    pub collision_rate: f64,
}

type Backend = Box<dyn StorageBackend + Send + Sync>;

struct Inner {
    table: Table<FnvIndexHasher, Backend>,
    mph: Option<BbHash>,
    journal: Option<Journal>,
    readonly: bool,
    config: StoreConfig,
    mph_path: Option<PathBuf>,
}

/// The embeddable key/value store.
pub struct Store {
    inner: RwLock<Inner>,
}

impl Store {
    /// Initializes storage (in-memory), a probing hasher, and an empty
    /// journal.
    pub fn create_in_memory(config: StoreConfig) -> Self {
        let storage = MemoryStorage::new(config.num_slots);
        let backend: Backend = wrap_cache(storage, &config);
        let hasher = ProbeHasher::new(FnvIndexHasher, config.max_probes);
        Self {
            inner: RwLock::new(Inner {
                table: Table::new(hasher, backend),
                mph: None,
                journal: Some(Journal::in_memory()),
                readonly: false,
                config,
                mph_path: None,
            }),
        }
    }

    /// Initializes a new file-backed store at `path` with room for
    /// `config.num_slots` slots, plus an empty journal sibling file.
    pub fn create(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        let storage = FileStorage::create(path, config.num_slots)?;
        let backend: Backend = wrap_cache(storage, &config);
        let hasher = ProbeHasher::new(FnvIndexHasher, config.max_probes);
        let journal = Journal::open(journal_path(path))?;
        Ok(Self {
            inner: RwLock::new(Inner {
                table: Table::new(hasher, backend),
                mph: None,
                journal: Some(journal),
                readonly: false,
                config,
                mph_path: Some(mph_path(path)),
            }),
        })
    }

    /// Opens an existing file-backed store. Validates the header, attaches
    /// the journal if its sibling file exists, and probes for a persisted
    /// MPH sidecar, attaching it if found.
    pub fn open(path: impl AsRef<Path>, readonly: bool) -> Result<Self> {
        let path = path.as_ref();
        let storage = FileStorage::open(path, readonly)?;
        let num_slots = storage.slot_count();
        let is_optimized = storage.is_optimized();
        let config = StoreConfig::new(num_slots);
        let backend: Backend = wrap_cache(storage, &config);
        let hasher = ProbeHasher::new(FnvIndexHasher, config.max_probes);

        let jpath = journal_path(path);
        let journal = if readonly && !crate::journal::exists(&jpath) {
            None
        } else {
            Some(Journal::open(&jpath)?)
        };

        let mpath = mph_path(path);
        let mph = if is_optimized && mpath.is_file() {
            Some(load_mph(&mpath)?)
        } else {
            None
        };

        Ok(Self {
            inner: RwLock::new(Inner {
                table: Table::new(hasher, backend),
                mph,
                journal,
                readonly,
                config,
                mph_path: Some(mpath),
            }),
        })
    }

    /// Hybrid lookup: ask the MPH first when present and claiming
    /// membership, falling through to the probing path otherwise
    /// (spec.md §4.7 "Hybrid lookup path").
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let inner = self.inner.read();
        if let Some(mph) = &inner.mph {
            if let Some(idx) = mph.slot_for(key) {
                if let Some((fp, payload)) = inner.table.storage().read(idx) {
                    let expected_fp = crate::hasher::fnv::fnv1a(key, crate::hasher::fnv::FINGERPRINT_SEED);
                    if fp == expected_fp {
                        return Ok(payload);
                    }
                }
            }
        }
        inner.table.get(key)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_ok()
    }

    /// Hybrid write: overwrite the MPH slot directly if `key` is a member
    /// of the current perfect hash, otherwise write via the probing path.
    /// Appends to the journal either way (spec.md §4.7).
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.readonly {
            return Err(MaphError::PermissionDenied);
        }
        if value.len() > PAYLOAD_MAX {
            return Err(MaphError::ValueTooLarge {
                len: value.len(),
                max: PAYLOAD_MAX,
            });
        }
        let mph_slot = inner.mph.as_ref().and_then(|m| m.slot_for(key));
        if let Some(idx) = mph_slot {
            let fp = crate::hasher::fnv::fnv1a(key, crate::hasher::fnv::FINGERPRINT_SEED);
            inner.table.storage_mut().write(idx, fp, value)?;
        } else {
            inner.table.set(key, value)?;
        }
        if let Some(journal) = &mut inner.journal {
            journal.append(key)?;
        }
        Ok(())
    }

    /// Hybrid remove: clears the MPH slot if `key` is a member, else
    /// removes via the probing path.
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.readonly {
            return Err(MaphError::PermissionDenied);
        }
        let mph_slot = inner.mph.as_ref().and_then(|m| m.slot_for(key));
        if let Some(idx) = mph_slot {
            inner.table.storage_mut().clear(idx)?;
            Ok(())
        } else {
            inner.table.remove(key)
        }
    }

    /// Transitions to perfect-hash mode, following spec.md §4.7's strict
    /// seven-step pipeline. Idempotent on success: a store that is already
    /// optimized is simply rebuilt against its current key set, folding in
    /// any hybrid-path inserts made since the last `optimize()`.
    pub fn optimize(&self) -> Result<()> {
        let mut inner = self.inner.write();

        // Step 1.
        if inner.readonly {
            return Err(MaphError::PermissionDenied);
        }

        // Step 2.
        if let Some(journal) = &mut inner.journal {
            journal.flush()?;
        }

        // Step 3.
        let keys: Vec<Vec<u8>> = match &inner.journal {
            Some(journal) if !journal.is_empty()? => journal.deduplicated_keys()?,
            _ => {
                // No journal records: fall back to scanning non-empty
                // slots. This store keeps no keys in payloads or a side
                // index (DESIGN.md's resolution of spec.md §9's open
                // question), so there is nothing to reconstruct — a
                // non-error no-op, per spec.md §4.7 step 3.
                return Ok(());
            }
        };

        if keys.is_empty() {
            return Ok(());
        }

        let num_slots = inner.table.storage().slot_count();
        if keys.len() > num_slots {
            return Err(MaphError::OptimizationFailed(format!(
                "{} keys exceed {} slots",
                keys.len(),
                num_slots
            )));
        }

        // Step 4: snapshot (key, value) pairs via the pre-optimization
        // (hybrid or standard) lookup path.
        let mut snapshot = Vec::with_capacity(keys.len());
        for key in &keys {
            match lookup_current(&inner, key) {
                Some(value) => snapshot.push((key.clone(), value)),
                None => continue, // removed since journal append; not live
            }
        }

        // Step 5.
        let mut builder = BbHashBuilder::new()
            .with_seed(inner.config.mph_seed)
            .with_gamma(inner.config.mph_gamma)
            .with_max_pilot_search(inner.config.mph_max_levels);
        builder.add_all(snapshot.iter().map(|(k, _)| k.clone()));
        let mph = builder.build()?;

        // Step 6: rewrite storage. Clear every slot first, then place
        // each live pair at its canonical MPH index.
        for i in 0..num_slots {
            inner.table.storage_mut().clear(i)?;
        }
        for (key, value) in &snapshot {
            let idx = mph.slot_for(key).ok_or_else(|| {
                MaphError::OptimizationFailed("key missing from freshly built MPH".into())
            })?;
            let fp = crate::hasher::fnv::fnv1a(key, crate::hasher::fnv::FINGERPRINT_SEED);
            inner.table.storage_mut().write(idx, fp, value)?;
        }

        // Step 7: flip is_optimized and persist the MPH artifact.
        persist_mph_flag(&mut inner)?;
        if let Some(path) = inner.mph_path.clone() {
            let bytes = mph.serialize()?;
            write_mph_sidecar(&path, &bytes)?;
        }
        inner.mph = Some(mph);

        if let Some(journal) = &mut inner.journal {
            journal.truncate()?;
            // Re-seed with only the keys that survived into the new MPH —
            // a key present in the old journal but since removed must not
            // reappear as a membership record after compaction.
            for (key, _) in &snapshot {
                journal.append(key)?;
            }
            journal.flush()?;
        }

        Ok(())
    }

    pub fn stats(&self) -> Result<Stats> {
        let inner = self.inner.read();
        let table_stats: TableStats = inner.table.stats();
        let journal_entries = match &inner.journal {
            Some(j) => j.deduplicated_keys()?.len(),
            None => 0,
        };
        Ok(Stats {
            used_slots: table_stats.used_slots,
            total_slots: table_stats.total_slots,
            load_factor: table_stats.load_factor,
            generation: inner.table.storage().generation(),
            is_optimized: inner.mph.is_some(),
            mph_key_count: inner.mph.as_ref().map(|m| m.key_count()).unwrap_or(0),
            journal_entries,
            collision_rate: table_stats.collision_rate,
        })
    }

    /// Requests durability of all prior writes and flushes the journal.
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.table.storage().sync()?;
        if let Some(journal) = &mut inner.journal {
            journal.flush()?;
        }
        Ok(())
    }

    /// Flushes outstanding state. Dropping the `Store` thereafter releases
    /// the mapping and file handles.
    pub fn close(&self) -> Result<()> {
        self.sync()
    }
}

fn lookup_current(inner: &Inner, key: &[u8]) -> Option<Vec<u8>> {
    if let Some(mph) = &inner.mph {
        if let Some(idx) = mph.slot_for(key) {
            if let Some((fp, payload)) = inner.table.storage().read(idx) {
                let expected_fp =
                    crate::hasher::fnv::fnv1a(key, crate::hasher::fnv::FINGERPRINT_SEED);
                if fp == expected_fp {
                    return Some(payload);
                }
            }
            return None;
        }
    }
    inner.table.get(key).ok()
}

fn persist_mph_flag(inner: &mut Inner) -> Result<()> {
    inner.table.storage_mut().set_optimized(true)?;
    inner.table.storage_mut().sync()?;
    Ok(())
}

fn wrap_cache<S: StorageBackend + Send + Sync + 'static>(storage: S, config: &StoreConfig) -> Backend {
    match config.cache {
        Some(cache) => Box::new(CachingStorage::new(storage, cache.capacity)),
        None => Box::new(storage),
    }
}

fn journal_path(store_path: &Path) -> PathBuf {
    let mut p = store_path.as_os_str().to_owned();
    p.push(".journal");
    PathBuf::from(p)
}

fn mph_path(store_path: &Path) -> PathBuf {
    let mut p = store_path.as_os_str().to_owned();
    p.push(".mph");
    PathBuf::from(p)
}

fn write_mph_sidecar(path: &Path, body: &[u8]) -> Result<()> {
    let mut out = Vec::with_capacity(8 + 8 + body.len());
    out.extend_from_slice(&MPH_MAGIC);
    out.extend_from_slice(&(body.len() as u64).to_le_bytes());
    out.extend_from_slice(body);
    std::fs::write(path, out)?;
    Ok(())
}

fn load_mph(path: &Path) -> Result<BbHash> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 16 || bytes[..8] != MPH_MAGIC {
        return Err(MaphError::InvalidFormat("bad .mph sidecar magic".into()));
    }
    let len = u64::from_le_bytes(bytes[8..16].try_into().unwrap()) as usize;
    if bytes.len() < 16 + len {
        return Err(MaphError::InvalidFormat("truncated .mph sidecar".into()));
    }
    BbHash::deserialize(&bytes[16..16 + len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn s1_basic_set_get_and_miss() {
        let store = Store::create_in_memory(StoreConfig::new(1024));
        store.set(b"alpha", b"1").unwrap();
        store.set(b"beta", b"2").unwrap();
        store.set(b"gamma", b"3").unwrap();

        assert_eq!(store.get(b"alpha").unwrap(), b"1");
        assert!(matches!(store.get(b"delta"), Err(MaphError::KeyNotFound)));

        let stats = store.stats().unwrap();
        assert_eq!(stats.used_slots, 3);
        assert!(!stats.is_optimized);
    }

    #[test]
    fn s2_optimize_then_hybrid_insert() {
        let store = Store::create_in_memory(StoreConfig::new(1024));
        store.set(b"alpha", b"1").unwrap();
        store.set(b"beta", b"2").unwrap();
        store.set(b"gamma", b"3").unwrap();

        store.optimize().unwrap();
        let stats = store.stats().unwrap();
        assert!(stats.is_optimized);
        assert!(stats.mph_key_count >= 3);

        assert_eq!(store.get(b"alpha").unwrap(), b"1");
        assert_eq!(store.get(b"gamma").unwrap(), b"3");

        store.set(b"delta", b"4").unwrap();
        assert_eq!(store.get(b"delta").unwrap(), b"4");
    }

    #[test]
    fn s3_thousand_keys_survive_optimize() {
        let store = Store::create_in_memory(StoreConfig::new(2048));
        for i in 0..1000u32 {
            store
                .set(format!("key_{i}").as_bytes(), i.to_string().as_bytes())
                .unwrap();
        }
        store.optimize().unwrap();
        for i in 0..1000u32 {
            let v = store.get(format!("key_{i}").as_bytes()).unwrap();
            assert_eq!(v, i.to_string().into_bytes());
        }
    }

    #[test]
    fn idempotent_optimize_preserves_values() {
        let store = Store::create_in_memory(StoreConfig::new(256));
        store.set(b"a", b"1").unwrap();
        store.set(b"b", b"2").unwrap();
        store.optimize().unwrap();
        store.optimize().unwrap();
        assert_eq!(store.get(b"a").unwrap(), b"1");
        assert_eq!(store.get(b"b").unwrap(), b"2");
        assert!(store.stats().unwrap().is_optimized);
    }

    #[test]
    fn remove_then_get_not_found_hybrid() {
        let store = Store::create_in_memory(StoreConfig::new(256));
        store.set(b"a", b"1").unwrap();
        store.optimize().unwrap();
        store.remove(b"a").unwrap();
        assert!(matches!(store.get(b"a"), Err(MaphError::KeyNotFound)));
    }

    #[test]
    fn file_backed_create_optimize_reopen_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.maph");
        {
            let store = Store::create(&path, StoreConfig::new(64)).unwrap();
            store.set(b"a", b"1").unwrap();
            store.set(b"b", b"2").unwrap();
            store.optimize().unwrap();
            store.sync().unwrap();
        }
        let store = Store::open(&path, false).unwrap();
        assert!(store.stats().unwrap().is_optimized);
        assert_eq!(store.get(b"a").unwrap(), b"1");
        assert_eq!(store.get(b"b").unwrap(), b"2");
    }

    #[test]
    fn readonly_open_rejects_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.maph");
        {
            let store = Store::create(&path, StoreConfig::new(16)).unwrap();
            store.set(b"a", b"1").unwrap();
        }
        let store = Store::open(&path, true).unwrap();
        assert_eq!(store.get(b"a").unwrap(), b"1");
        assert!(matches!(
            store.set(b"b", b"2"),
            Err(MaphError::PermissionDenied)
        ));
        assert!(matches!(store.optimize(), Err(MaphError::PermissionDenied)));
    }

    #[test]
    fn value_too_large_is_rejected() {
        let store = Store::create_in_memory(StoreConfig::new(16));
        let big = vec![0u8; PAYLOAD_MAX + 1];
        assert!(matches!(
            store.set(b"k", &big),
            Err(MaphError::ValueTooLarge { .. })
        ));
    }

    #[test]
    fn optimize_with_no_inserts_is_a_no_op() {
        let store = Store::create_in_memory(StoreConfig::new(16));
        store.optimize().unwrap();
        assert!(!store.stats().unwrap().is_optimized);
    }
}
