//! LWW register behaviour.

use claims::{assert_none, assert_ok, assert_some, assert_some_eq};
use meld_primitives::id::ExecutorId;
use meld_sys::mock;

use super::fresh_replica;
use crate::collections::LwwRegister;

#[test]
fn test_lww_new_and_get() {
    fresh_replica();
    let reg: LwwRegister<String> = LwwRegister::new();
    assert_none!(assert_ok!(reg.get()), "a fresh register is unset");
    assert_none!(assert_ok!(reg.timestamp()));
}

#[test]
fn test_lww_new_with_initial_value() {
    fresh_replica();
    let reg = assert_ok!(LwwRegister::new_with(Some("Hello".to_string())));
    assert_some_eq!(assert_ok!(reg.get()), "Hello".to_string());
    let _ = assert_some!(assert_ok!(reg.timestamp()), "the write is stamped");
}

#[test]
fn test_lww_new_with_explicit_null() {
    fresh_replica();
    let reg: LwwRegister<String> = assert_ok!(LwwRegister::new_with(None));
    assert_none!(assert_ok!(reg.get()), "explicit null reads as absent");
    let _ = assert_some!(
        assert_ok!(reg.timestamp()),
        "but the clear itself is a stamped write",
    );
}

#[test]
fn test_lww_set() {
    fresh_replica();
    let mut reg = assert_ok!(LwwRegister::new_with(Some("Initial".to_string())));
    assert_some_eq!(assert_ok!(reg.get()), "Initial".to_string());

    assert_ok!(reg.set("Updated".to_string()));
    assert_some_eq!(assert_ok!(reg.get()), "Updated".to_string());
}

#[test]
fn test_lww_clear() {
    fresh_replica();
    let mut reg = assert_ok!(LwwRegister::new_with(Some("Value".to_string())));
    assert_ok!(reg.clear());
    assert_none!(assert_ok!(reg.get()));
}

#[test]
fn test_lww_local_write_ignores_clock() {
    // On the local replica a write always overwrites, even when the
    // clock runs backwards; the HLC only arbitrates across replicas.
    fresh_replica();
    mock::set_time(100);
    let mut reg = assert_ok!(LwwRegister::new_with(Some("first".to_string())));

    mock::set_time(50);
    assert_ok!(reg.set("second".to_string()));
    assert_some_eq!(assert_ok!(reg.get()), "second".to_string());
}

#[test]
fn test_lww_sequential_timestamps_increase() {
    fresh_replica();
    let mut reg = assert_ok!(LwwRegister::new_with(Some("v1".to_string())));
    let ts1 = assert_some!(assert_ok!(reg.timestamp()));

    assert_ok!(reg.set("v2".to_string()));
    let ts2 = assert_some!(assert_ok!(reg.timestamp()));

    assert_ok!(reg.set("v3".to_string()));
    let ts3 = assert_some!(assert_ok!(reg.timestamp()));

    assert!(ts2 > ts1, "timestamps advance");
    assert!(ts3 > ts2, "timestamps advance");
    assert_some_eq!(assert_ok!(reg.get()), "v3".to_string());
}

#[test]
fn test_lww_with_different_types() {
    fresh_replica();

    let mut num: LwwRegister<u64> = LwwRegister::new();
    assert_ok!(num.set(42));
    assert_ok!(num.set(100));
    assert_some_eq!(assert_ok!(num.get()), 100);

    let mut flag: LwwRegister<bool> = LwwRegister::new();
    assert_ok!(flag.set(false));
    assert_ok!(flag.set(true));
    assert_some_eq!(assert_ok!(flag.get()), true);

    let mut list: LwwRegister<Vec<u64>> = LwwRegister::new();
    assert_ok!(list.set(vec![1, 2, 3]));
    assert_ok!(list.set(vec![4, 5, 6]));
    assert_some_eq!(assert_ok!(list.get()), vec![4, 5, 6]);
}

#[test]
fn test_lww_handle_round_trip() {
    fresh_replica();
    let reg = assert_ok!(LwwRegister::new_with(Some("持久".to_string())));

    let bytes = borsh::to_vec(&reg).expect("serialize failed");
    let restored: LwwRegister<String> = borsh::from_slice(&bytes).expect("deserialize failed");
    assert_eq!(restored, reg, "identity survives serialization");
    assert_some_eq!(assert_ok!(restored.get()), "持久".to_string());
}

#[test]
fn test_lww_last_write_wins_under_clock_skew() {
    // Replica A writes "alpha" at physical time 100; replica B writes
    // "beta" at 90. Whichever order the deltas arrive in, both replicas
    // converge on the later write.
    fresh_replica();
    let mut reg: LwwRegister<String> = LwwRegister::new();
    let base = mock::snapshot();

    mock::set_executor_id(ExecutorId::new([0xaa; 32]));
    mock::set_time(100);
    meld_sdk::delta::start();
    assert_ok!(reg.set("alpha".to_string()));
    let _ = assert_ok!(meld_sdk::delta::commit());
    let a_commits = mock::take_commits();
    let a_state = mock::snapshot();

    mock::restore(base);
    meld_sdk::delta::reset();
    mock::set_executor_id(ExecutorId::new([0xbb; 32]));
    mock::set_time(90);
    meld_sdk::delta::start();
    assert_ok!(reg.set("beta".to_string()));
    let _ = assert_ok!(meld_sdk::delta::commit());
    let b_commits = mock::take_commits();

    // B merges A's delta: the later physical time wins.
    super::replicate(&a_commits);
    assert_some_eq!(assert_ok!(reg.get()), "alpha".to_string());

    // A merges B's delta: nothing changes.
    mock::restore(a_state);
    super::replicate(&b_commits);
    assert_some_eq!(assert_ok!(reg.get()), "alpha".to_string());
}

#[test]
fn test_lww_equal_times_break_on_node_id() {
    fresh_replica();
    let mut reg: LwwRegister<String> = LwwRegister::new();
    let base = mock::snapshot();

    mock::set_executor_id(ExecutorId::new([0x01; 32]));
    mock::set_time(100);
    meld_sdk::delta::start();
    assert_ok!(reg.set("low".to_string()));
    let _ = assert_ok!(meld_sdk::delta::commit());
    let a_commits = mock::take_commits();
    let a_state = mock::snapshot();

    mock::restore(base);
    meld_sdk::delta::reset();
    mock::set_executor_id(ExecutorId::new([0x02; 32]));
    mock::set_time(100);
    meld_sdk::delta::start();
    assert_ok!(reg.set("high".to_string()));
    let _ = assert_ok!(meld_sdk::delta::commit());
    let b_commits = mock::take_commits();

    super::replicate(&a_commits);
    assert_some_eq!(assert_ok!(reg.get()), "high".to_string());

    mock::restore(a_state);
    super::replicate(&b_commits);
    assert_some_eq!(
        assert_ok!(reg.get()),
        "high".to_string(),
        "the higher node id wins deterministically on both replicas",
    );
}
