//! Content-addressed frozen storage.

use claims::{assert_err, assert_ok, assert_some};
use meld_primitives::id::ContentHash;

use super::fresh_replica;
use crate::collections::FrozenStorage;
use crate::errors::StorageError;

#[test]
fn add_is_content_addressed() {
    fresh_replica();
    let mut storage: FrozenStorage<String> = FrozenStorage::new();

    let hash = assert_ok!(storage.add("hello".to_string()));
    let expected = ContentHash::digest(&borsh::to_vec(&"hello".to_string()).expect("serialize failed"));
    assert_eq!(hash, expected, "the hash is SHA-256 of the canonical bytes");
    assert_eq!(
        assert_ok!(FrozenStorage::<String>::compute_hash(&"hello".to_string())),
        hash,
        "compute_hash matches add",
    );

    let value = assert_some!(assert_ok!(storage.get(&hash)));
    assert_eq!(*value, "hello", "content round-trips under its hash");
}

#[test]
fn add_is_idempotent() {
    fresh_replica();
    let mut storage: FrozenStorage<String> = FrozenStorage::new();

    let first = assert_ok!(storage.add("hello".to_string()));
    assert_eq!(storage.len().expect("len failed"), 1);

    let second = assert_ok!(storage.add("hello".to_string()));
    assert_eq!(first, second, "the same value lands at the same hash");
    assert_eq!(
        storage.len().expect("len failed"),
        1,
        "a repeated add does not grow the store",
    );
    assert_eq!(
        storage.entries().expect("entries failed").count(),
        1,
        "entries agree with len",
    );
}

#[test]
fn repeated_add_records_no_action() {
    fresh_replica();
    let mut storage: FrozenStorage<String> = FrozenStorage::new();
    let _ = assert_ok!(storage.add("hello".to_string()));

    meld_sdk::delta::start();
    let _ = assert_ok!(storage.add("hello".to_string()));
    assert_eq!(
        meld_sdk::delta::action_count(),
        0,
        "an idempotent add is not replicated again",
    );
}

#[test]
fn remove_is_forbidden() {
    fresh_replica();
    let mut storage: FrozenStorage<String> = FrozenStorage::new();
    let hash = assert_ok!(storage.add("hello".to_string()));

    let err = assert_err!(storage.remove(&hash));
    assert_eq!(err, StorageError::FrozenViolation);
    assert!(
        assert_ok!(storage.contains(&hash)),
        "the value is still there",
    );
}

#[test]
fn distinct_values_get_distinct_hashes() {
    fresh_replica();
    let mut storage: FrozenStorage<String> = FrozenStorage::new();

    let a = assert_ok!(storage.add("a".to_string()));
    let b = assert_ok!(storage.add("b".to_string()));
    assert_ne!(a, b);
    assert_eq!(storage.len().expect("len failed"), 2);

    let hashes: Vec<ContentHash> = storage
        .entries()
        .expect("entries failed")
        .map(|(hash, _)| hash)
        .collect();
    assert!(hashes.contains(&a));
    assert!(hashes.contains(&b));
}

#[test]
fn missing_hash_reads_none() {
    fresh_replica();
    let storage: FrozenStorage<String> = FrozenStorage::new();
    let absent = ContentHash::digest(b"never added");
    assert_eq!(assert_ok!(storage.get(&absent)), None);
    assert!(!assert_ok!(storage.contains(&absent)));
}
