//! Cross-replica convergence scenarios.
//!
//! Each test simulates replicas with host snapshots: a shared ancestor
//! snapshot is taken, each replica diverges from it, and the committed
//! delta artifacts are exchanged in both directions.

use claims::{assert_ok, assert_some_eq};
use meld_primitives::id::{ContextId, ExecutorId};
use meld_sdk::delta;
use meld_sys::mock;

use super::{fresh_replica, replicate};
use crate::collections::{LwwRegister, UnorderedMap, UnorderedSet, Vector};
use crate::errors::StorageError;

#[test]
fn set_add_wins_over_concurrent_remove() {
    // Replica A adds "x" at t=10. Replica B removes "x" at t=5 without
    // having seen the add. Add wins on both replicas.
    fresh_replica();
    let mut set: UnorderedSet<String> = UnorderedSet::new();
    let base = mock::snapshot();

    mock::set_executor_id(ExecutorId::new([0xaa; 32]));
    mock::set_time(10);
    delta::start();
    assert!(assert_ok!(set.insert("x".to_string())));
    let _ = assert_ok!(delta::commit());
    let a_commits = mock::take_commits();
    let a_state = mock::snapshot();

    mock::restore(base);
    delta::reset();
    mock::set_executor_id(ExecutorId::new([0xbb; 32]));
    mock::set_time(5);
    delta::start();
    let _ = assert_ok!(set.remove("x"));
    let _ = assert_ok!(delta::commit());
    let b_commits = mock::take_commits();

    replicate(&a_commits);
    assert!(
        assert_ok!(set.contains("x")),
        "B: the add carries the later clock",
    );

    mock::restore(a_state);
    replicate(&b_commits);
    assert!(
        assert_ok!(set.contains("x")),
        "A: the older removal does not suppress the add",
    );
}

#[test]
fn set_remove_wins_when_strictly_later() {
    fresh_replica();
    let mut set: UnorderedSet<String> = UnorderedSet::new();

    mock::set_time(5);
    delta::start();
    let _ = assert_ok!(set.insert("x".to_string()));
    let _ = assert_ok!(delta::commit());
    let _ = mock::take_commits();
    let base = mock::snapshot();

    // Replica B removes at a later time.
    mock::set_time(10);
    delta::start();
    assert!(assert_ok!(set.remove("x")));
    let _ = assert_ok!(delta::commit());
    let b_commits = mock::take_commits();

    // A, still holding the element, merges the removal.
    mock::restore(base);
    delta::reset();
    replicate(&b_commits);
    assert!(!assert_ok!(set.contains("x")), "the later removal sticks");
}

#[test]
fn map_concurrent_writes_converge_to_later_writer() {
    fresh_replica();
    let mut map: UnorderedMap<String, String> = UnorderedMap::new();
    let base = mock::snapshot();

    mock::set_executor_id(ExecutorId::new([0xaa; 32]));
    mock::set_time(100);
    delta::start();
    let _ = assert_ok!(map.insert("title".to_string(), "from A".to_string()));
    let _ = assert_ok!(delta::commit());
    let a_commits = mock::take_commits();
    let a_state = mock::snapshot();

    mock::restore(base);
    delta::reset();
    mock::set_executor_id(ExecutorId::new([0xbb; 32]));
    mock::set_time(90);
    delta::start();
    let _ = assert_ok!(map.insert("title".to_string(), "from B".to_string()));
    let _ = assert_ok!(map.insert("only-b".to_string(), "kept".to_string()));
    let _ = assert_ok!(delta::commit());
    let b_commits = mock::take_commits();

    replicate(&a_commits);
    assert_some_eq!(assert_ok!(map.get("title")), "from A".to_string());
    assert_some_eq!(assert_ok!(map.get("only-b")), "kept".to_string());

    mock::restore(a_state);
    replicate(&b_commits);
    assert_some_eq!(
        assert_ok!(map.get("title")),
        "from A".to_string(),
        "both replicas keep the later writer",
    );
    assert_some_eq!(
        assert_ok!(map.get("only-b")),
        "kept".to_string(),
        "disjoint keys union",
    );
}

#[test]
fn map_tombstone_suppresses_older_write() {
    fresh_replica();
    let mut map: UnorderedMap<String, String> = UnorderedMap::new();
    let base = mock::snapshot();

    // A writes at t=50.
    mock::set_time(50);
    delta::start();
    let _ = assert_ok!(map.insert("k".to_string(), "stale".to_string()));
    let _ = assert_ok!(delta::commit());
    let a_commits = mock::take_commits();

    // B removed the key at t=100 (it knew an earlier value).
    mock::restore(base);
    delta::reset();
    mock::set_time(80);
    delta::start();
    let _ = assert_ok!(map.insert("k".to_string(), "old".to_string()));
    let _ = assert_ok!(delta::commit());
    let _ = mock::take_commits();
    mock::set_time(100);
    delta::start();
    let _ = assert_ok!(map.remove("k"));
    let _ = assert_ok!(delta::commit());
    let _ = mock::take_commits();

    // A's older write arrives after the removal.
    replicate(&a_commits);
    assert_eq!(
        assert_ok!(map.get("k")),
        None,
        "the tombstone is newer than the replayed write",
    );
}

#[test]
fn vector_edit_idiom_replace_through_register() {
    // The channel-member idiom: editing a vector means building a new
    // one and atomically replacing it behind an LWW register.
    fresh_replica();
    let mut members: Vector<String> = Vector::new();
    assert_ok!(members.push("u1".to_string()));
    assert_ok!(members.push("u2".to_string()));
    assert_ok!(members.push("u3".to_string()));

    let mut channel: LwwRegister<Vector<String>> =
        assert_ok!(LwwRegister::new_with(Some(members)));
    let base = mock::snapshot();
    delta::start();

    // Remove "u2" by rebuilding.
    let current = assert_ok!(channel.get()).expect("register is set");
    let mut rebuilt: Vector<String> = Vector::new();
    for member in assert_ok!(current.iter()) {
        if member != "u2" {
            assert_ok!(rebuilt.push(member));
        }
    }
    assert_ok!(channel.set(rebuilt));
    let _ = assert_ok!(delta::commit());
    let commits = mock::take_commits();

    // Reading back through the register sees the replacement.
    let replaced = assert_ok!(channel.get()).expect("register is set");
    let items: Vec<String> = assert_ok!(replaced.iter()).collect();
    assert_eq!(items, vec!["u1".to_string(), "u3".to_string()]);
    assert_eq!(assert_ok!(replaced.len()), 2);
    assert_eq!(
        replaced.get(2),
        Err(StorageError::OutOfBounds { index: 2 }),
        "the third slot is gone",
    );

    // A peer that merges the delta sees the same membership.
    mock::restore(base);
    delta::reset();
    replicate(&commits);
    let peer_view = assert_ok!(channel.get()).expect("register replicated");
    let items: Vec<String> = assert_ok!(peer_view.iter()).collect();
    assert_eq!(items, vec!["u1".to_string(), "u3".to_string()]);
}

#[test]
fn artifact_applies_b_to_equal_state() {
    // Artifact round trip: a delta produced on A and applied on B
    // leaves B's collection states equal to A's.
    fresh_replica();
    let mut map: UnorderedMap<String, u64> = UnorderedMap::new();
    let mut set: UnorderedSet<String> = UnorderedSet::new();
    let base = mock::snapshot();

    delta::start();
    let _ = assert_ok!(map.insert("a".to_string(), 1));
    let _ = assert_ok!(map.insert("b".to_string(), 2));
    let _ = assert_ok!(set.insert("tag".to_string()));
    let _ = assert_ok!(delta::commit());
    let a_commits = mock::take_commits();

    let a_entries: Vec<(String, u64)> = assert_ok!(map.entries()).collect();

    mock::restore(base);
    delta::reset();
    replicate(&a_commits);

    let b_entries: Vec<(String, u64)> = assert_ok!(map.entries()).collect();
    assert_eq!(a_entries, b_entries, "B reads exactly what A wrote");
    assert!(assert_ok!(set.contains("tag")));
}

#[test]
fn identical_host_responses_produce_identical_artifacts() {
    // Determinism: two replicas driven through the same script with the
    // same host responses commit byte-identical artifacts.
    let script = || {
        fresh_replica();
        mock::set_context_id(ContextId::new([0x33; 32]));
        mock::set_executor_id(ExecutorId::new([0x44; 32]));
        mock::set_time(1_000);

        delta::start();
        let mut map: UnorderedMap<String, String> = UnorderedMap::new();
        let _ = assert_ok!(map.insert("k".to_string(), "v".to_string()));
        let mut set: UnorderedSet<u64> = UnorderedSet::new();
        let _ = assert_ok!(set.insert(7));
        let _ = assert_ok!(set.remove(&7));
        let _ = assert_ok!(delta::commit());
        mock::take_commits()
    };

    let first = script();
    let second = script();

    assert_eq!(first.len(), 1, "one commit per run");
    assert_eq!(
        first[0].artifact, second[0].artifact,
        "artifact bytes are a pure function of the host responses",
    );
    assert_eq!(first[0].root_hash, second[0].root_hash);
}
