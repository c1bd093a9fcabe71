//! End-to-end lifecycle scenarios and cross-module invariants that don't
//! fit naturally as a single module's unit test (header corruption
//! recovery, concurrent readers racing a writer, value-rejection leaving
//! stats untouched).

use maph::{MaphError, Store, StoreConfig};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

#[test]
fn s4_oversized_value_is_rejected_and_state_is_untouched() {
    let store = Store::create_in_memory(StoreConfig::new(64));
    let before = store.stats().unwrap();

    let oversized = vec![0u8; maph::slot::PAYLOAD_MAX + 1];
    let err = store.set(b"k", &oversized).unwrap_err();
    assert!(matches!(err, MaphError::ValueTooLarge { .. }));

    assert!(matches!(store.get(b"k"), Err(MaphError::KeyNotFound)));
    let after = store.stats().unwrap();
    assert_eq!(before.used_slots, after.used_slots);
}

#[test]
fn s5_readonly_reopen_rejects_writes_but_serves_prior_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("s5.maph");
    {
        let store = Store::create(&path, StoreConfig::new(32)).unwrap();
        store.set(b"k", b"v").unwrap();
        store.sync().unwrap();
    }

    let store = Store::open(&path, true).unwrap();
    assert!(matches!(
        store.set(b"k", b"v2"),
        Err(MaphError::PermissionDenied)
    ));
    assert_eq!(store.get(b"k").unwrap(), b"v");
}

#[test]
fn s6_corrupted_header_is_rejected_with_no_partial_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("s6.maph");
    {
        let store = Store::create(&path, StoreConfig::new(32)).unwrap();
        store.set(b"k", b"v").unwrap();
        store.sync().unwrap();
    }

    // Stomp the first four bytes of the magic.
    {
        use std::io::{Seek, SeekFrom, Write};
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(&[0, 0, 0, 0]).unwrap();
    }

    let result = Store::open(&path, false);
    assert!(matches!(result, Err(MaphError::InvalidFormat(_))));
}

#[test]
fn invariant_header_parameters_are_stable_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hdr.maph");
    {
        let store = Store::create(&path, StoreConfig::new(128)).unwrap();
        store.set(b"a", b"1").unwrap();
    }
    let store = Store::open(&path, false).unwrap();
    assert_eq!(store.stats().unwrap().total_slots, 128);
}

#[test]
fn invariant_concurrent_readers_never_observe_a_torn_slot() {
    let store = Arc::new(Store::create_in_memory(StoreConfig::new(256)));
    store.set(b"k", b"initial").unwrap();

    let writer_store = Arc::clone(&store);
    let writer = thread::spawn(move || {
        for i in 0..2000u32 {
            let value = format!("v{i}");
            writer_store.set(b"k", value.as_bytes()).unwrap();
        }
    });

    let mut readers = Vec::new();
    for _ in 0..4 {
        let reader_store = Arc::clone(&store);
        readers.push(thread::spawn(move || {
            for _ in 0..2000 {
                let value = reader_store.get(b"k").unwrap();
                let text = std::str::from_utf8(&value).unwrap();
                assert!(text == "initial" || text.starts_with('v'));
            }
        }));
    }

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}

#[test]
fn s2_full_hybrid_scenario() {
    let store = Store::create_in_memory(StoreConfig::new(1024));
    store.set(b"alpha", b"1").unwrap();
    store.set(b"beta", b"2").unwrap();
    store.set(b"gamma", b"3").unwrap();

    assert_eq!(store.get(b"alpha").unwrap(), b"1");
    assert!(matches!(store.get(b"delta"), Err(MaphError::KeyNotFound)));
    let stats = store.stats().unwrap();
    assert_eq!(stats.used_slots, 3);
    assert!(!stats.is_optimized);

    store.optimize().unwrap();
    let stats = store.stats().unwrap();
    assert!(stats.is_optimized);
    assert!(stats.mph_key_count >= 3);
    assert_eq!(store.get(b"alpha").unwrap(), b"1");
    assert_eq!(store.get(b"gamma").unwrap(), b"3");

    store.set(b"delta", b"4").unwrap();
    assert_eq!(store.get(b"delta").unwrap(), b"4");
}
