//! Counter behaviour, including the cross-executor scenario.

use claims::{assert_err, assert_ok};
use meld_primitives::id::ExecutorId;
use meld_sys::mock;

use super::fresh_replica;
use crate::collections::{Counter, PnCounter};
use crate::errors::StorageError;

#[test]
fn counter_starts_at_zero() {
    fresh_replica();
    let counter: Counter = Counter::new();
    assert_eq!(counter.value().expect("value failed"), 0);
}

#[test]
fn counter_across_executors() {
    // Two executors contribute to the same counter within one context:
    // the value is the sum, and each executor's bucket is visible.
    fresh_replica();
    let mut counter: Counter = Counter::new();

    let first = ExecutorId::new([0x01; 32]);
    let second = ExecutorId::new([0x02; 32]);

    mock::set_executor_id(first);
    assert_ok!(counter.increment());

    mock::set_executor_id(second);
    assert_ok!(counter.increment_by(3));

    assert_eq!(counter.value().expect("value failed"), 4);
    assert_eq!(
        counter.executor_count(Some(&first)).expect("count failed"),
        1
    );
    assert_eq!(
        counter.executor_count(Some(&second)).expect("count failed"),
        3
    );
}

#[test]
fn executor_count_defaults_to_caller() {
    fresh_replica();
    let mut counter: Counter = Counter::new();
    let me = ExecutorId::new([0x0a; 32]);
    mock::set_executor_id(me);

    assert_ok!(counter.increment_by(2));
    assert_eq!(counter.executor_count(None).expect("count failed"), 2);
}

#[test]
fn counter_value_never_decreases_across_invocations() {
    fresh_replica();
    let mut counter: Counter = Counter::new();

    let mut last = 0;
    for _ in 0..5 {
        meld_sdk::delta::start();
        assert_ok!(counter.increment());
        let _ = assert_ok!(meld_sdk::delta::commit());
        let value = counter.value().expect("value failed");
        assert!(value >= last, "monotonic: {value} >= {last}");
        last = value;
    }
    assert_eq!(last, 5);
}

#[test]
fn increment_by_zero_is_a_no_op() {
    fresh_replica();
    let mut counter: Counter = Counter::new();
    assert_ok!(counter.increment_by(0));
    assert_eq!(counter.value().expect("value failed"), 0);
    assert_eq!(meld_sdk::delta::action_count(), 0, "no action recorded");
}

#[test]
fn increment_overflow_is_invalid_amount() {
    fresh_replica();
    let mut counter: Counter = Counter::new();
    assert_ok!(counter.increment_by(u64::MAX));
    let err = assert_err!(counter.increment());
    assert_eq!(err, StorageError::InvalidAmount);
}

#[test]
fn pn_counter_decrements() {
    fresh_replica();
    let mut counter = PnCounter::new();

    assert_ok!(counter.increment_by(10));
    assert_ok!(counter.decrement_by(3));
    assert_ok!(counter.decrement());

    assert_eq!(counter.value().expect("value failed"), 6);
    assert_eq!(counter.executor_count(None).expect("count failed"), 6);
}

#[test]
fn counter_replicates_across_replicas() {
    fresh_replica();

    // Shared ancestor state: the counter exists on both replicas.
    let mut counter: Counter = Counter::new();
    let base = mock::snapshot();

    // Replica A contributes 5.
    mock::set_executor_id(ExecutorId::new([0xaa; 32]));
    meld_sdk::delta::start();
    assert_ok!(counter.increment_by(5));
    let _ = assert_ok!(meld_sdk::delta::commit());
    let a_commits = mock::take_commits();
    let a_state = mock::snapshot();

    // Replica B, from the same ancestor, contributes 3.
    mock::restore(base);
    meld_sdk::delta::reset();
    mock::set_executor_id(ExecutorId::new([0xbb; 32]));
    meld_sdk::delta::start();
    assert_ok!(counter.increment_by(3));
    let _ = assert_ok!(meld_sdk::delta::commit());
    let b_commits = mock::take_commits();

    // B merges A's delta.
    super::replicate(&a_commits);
    assert_eq!(counter.value().expect("value failed"), 8, "B sees both");

    // A merges B's delta.
    mock::restore(a_state);
    super::replicate(&b_commits);
    assert_eq!(counter.value().expect("value failed"), 8, "A sees both");
}

#[test]
fn counter_merge_is_idempotent_under_redelivery() {
    fresh_replica();
    let mut counter: Counter = Counter::new();
    let base = mock::snapshot();

    mock::set_executor_id(ExecutorId::new([0xaa; 32]));
    meld_sdk::delta::start();
    assert_ok!(counter.increment_by(5));
    let _ = assert_ok!(meld_sdk::delta::commit());
    let a_commits = mock::take_commits();

    mock::restore(base);
    meld_sdk::delta::reset();
    super::replicate(&a_commits);
    super::replicate(&a_commits);
    super::replicate(&a_commits);

    assert_eq!(
        counter.value().expect("value failed"),
        5,
        "redelivered deltas do not double-count",
    );
}
