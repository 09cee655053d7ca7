//! Per-executor counters.

use core::fmt;

use borsh::io::{Read, Result as IoResult, Write};
use borsh::{BorshDeserialize, BorshSerialize};
use meld_primitives::crdt::{CrdtKind, Mergeable};
use meld_primitives::id::{CollectionId, ExecutorId};
use meld_primitives::store::counter_key;
use meld_primitives::value::{CollectionRef, StoredValue};
use meld_sdk::env;

use super::record_update;
use crate::errors::StorageError;
use crate::stored::{unexpected, StorageValue};

/// A handle to a replicated counter.
///
/// Physically a map from executor identity to that executor's
/// contribution; the value is the sum over all executors. Buckets only
/// grow, so replicas merge by taking each bucket's maximum and no
/// increment is ever lost. `Counter<false>` (the default) is grow-only;
/// `Counter<true>` additionally tracks a negative bucket per executor
/// and allows decrements.
pub struct Counter<const PN: bool = false> {
    id: CollectionId,
}

/// A counter supporting decrements.
pub type PnCounter = Counter<true>;

impl<const PN: bool> Counter<PN> {
    /// Creates a zero counter with a fresh host-assigned id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(env::counter_new())
    }

    #[must_use]
    pub const fn from_id(id: CollectionId) -> Self {
        Self { id }
    }

    #[must_use]
    pub const fn id(&self) -> &CollectionId {
        &self.id
    }

    /// Adds one to the current executor's contribution.
    pub fn increment(&mut self) -> Result<(), StorageError> {
        self.apply(1, true)
    }

    /// Adds `amount` to the current executor's contribution.
    pub fn increment_by(&mut self, amount: u64) -> Result<(), StorageError> {
        self.apply(amount, true)
    }

    /// The sum of every executor's contribution.
    pub fn value(&self) -> Result<u64, StorageError> {
        Ok(env::counter_value(&self.id)?)
    }

    /// One executor's net contribution; the current executor's when
    /// `executor` is `None`.
    pub fn executor_count(&self, executor: Option<&ExecutorId>) -> Result<u64, StorageError> {
        let executor = match executor {
            Some(executor) => *executor,
            None => env::executor_id(),
        };
        Ok(env::counter_executor_count(&self.id, &executor)?)
    }

    fn apply(&mut self, amount: u64, positive: bool) -> Result<(), StorageError> {
        if amount == 0 {
            return Ok(());
        }
        let current = self.executor_count(None)?;
        if positive && current.checked_add(amount).is_none() {
            return Err(StorageError::InvalidAmount);
        }
        let time = env::time_now();
        let total = env::counter_increment(&self.id, amount, positive, time)?;
        let executor = env::executor_id();
        let stored = StoredValue::U64(total);
        record_update(
            self.id,
            CrdtKind::Counter,
            &counter_key(&executor, positive),
            &stored,
            &stored.to_vec(),
            time,
        );
        Ok(())
    }
}

impl Counter<true> {
    /// Subtracts one from the current executor's contribution.
    pub fn decrement(&mut self) -> Result<(), StorageError> {
        self.apply(1, false)
    }

    /// Subtracts `amount` from the current executor's contribution.
    pub fn decrement_by(&mut self, amount: u64) -> Result<(), StorageError> {
        self.apply(amount, false)
    }
}

impl<const PN: bool> Default for Counter<PN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const PN: bool> Clone for Counter<PN> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<const PN: bool> Copy for Counter<PN> {}

impl<const PN: bool> PartialEq for Counter<PN> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<const PN: bool> Eq for Counter<PN> {}

impl<const PN: bool> fmt::Debug for Counter<PN> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counter").field(&self.id).finish()
    }
}

impl<const PN: bool> BorshSerialize for Counter<PN> {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.id.serialize(writer)
    }
}

impl<const PN: bool> BorshDeserialize for Counter<PN> {
    fn deserialize_reader<R: Read>(reader: &mut R) -> IoResult<Self> {
        CollectionId::deserialize_reader(reader).map(Self::from_id)
    }
}

impl<const PN: bool> StorageValue for Counter<PN> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Ref(CollectionRef {
            kind: CrdtKind::Counter,
            id: self.id,
        })
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Ref(CollectionRef {
                kind: CrdtKind::Counter,
                id,
            }) => Ok(Self::from_id(id)),
            other => Err(unexpected("counter reference", &other)),
        }
    }
}

impl<const PN: bool> Mergeable for Counter<PN> {
    fn merge(&mut self, _other: &Self) {}
}
