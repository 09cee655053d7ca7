//! A last-writer-wins register.

use core::fmt;
use core::marker::PhantomData;

use borsh::io::{Read, Result as IoResult, Write};
use borsh::{BorshDeserialize, BorshSerialize};
use meld_primitives::crdt::{CrdtKind, Mergeable};
use meld_primitives::hlc::Hlc;
use meld_primitives::id::CollectionId;
use meld_primitives::store::LWW_SLOT_KEY;
use meld_primitives::value::{CollectionRef, StoredValue};
use meld_sdk::env;

use super::{record_update, track_children};
use crate::errors::StorageError;
use crate::stored::{unexpected, StorageValue};

/// A handle to a replicated optional value with last-writer-wins
/// arbitration.
///
/// Local writes always overwrite, regardless of the stored timestamp;
/// across replicas the write with the greater hybrid logical clock wins,
/// and the node identity breaks exact ties. Clearing is itself a write
/// (of an explicit null), so a clear can win over a concurrent set.
pub struct LwwRegister<T> {
    id: CollectionId,
    _priv: PhantomData<T>,
}

impl<T> LwwRegister<T> {
    /// Creates a register that has never been written.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(env::lww_new())
    }

    #[must_use]
    pub const fn from_id(id: CollectionId) -> Self {
        Self {
            id,
            _priv: PhantomData,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &CollectionId {
        &self.id
    }

    /// The hybrid logical clock of the latest write, if any.
    pub fn timestamp(&self) -> Result<Option<Hlc>, StorageError> {
        Ok(env::lww_timestamp(&self.id)?)
    }
}

impl<T: StorageValue> LwwRegister<T> {
    /// Creates a register with an explicit initial state: `Some` writes
    /// the value, `None` writes an explicit null (distinct from never
    /// having been written).
    pub fn new_with(initial: Option<T>) -> Result<Self, StorageError> {
        let mut register = Self::new();
        match initial {
            Some(value) => register.set(value)?,
            None => register.clear()?,
        }
        Ok(register)
    }

    /// Writes a value unconditionally.
    pub fn set(&mut self, value: T) -> Result<(), StorageError> {
        self.write(value.to_stored())
    }

    /// Writes an explicit null.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.write(StoredValue::Null)
    }

    /// The current value; `None` when unset or cleared.
    pub fn get(&self) -> Result<Option<T>, StorageError> {
        let Some(bytes) = env::lww_get(&self.id)? else {
            return Ok(None);
        };
        let stored = StoredValue::from_slice(&bytes)?;
        if stored.is_null() {
            return Ok(None);
        }
        track_children(self.id, CrdtKind::LwwRegister, LWW_SLOT_KEY, &stored);
        T::from_stored(stored).map(Some)
    }

    fn write(&mut self, stored: StoredValue) -> Result<(), StorageError> {
        let value_bytes = stored.to_vec();
        let time = env::time_now();
        env::lww_set(&self.id, &value_bytes, time)?;
        record_update(
            self.id,
            CrdtKind::LwwRegister,
            LWW_SLOT_KEY,
            &stored,
            &value_bytes,
            time,
        );
        Ok(())
    }
}

impl<T> Default for LwwRegister<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for LwwRegister<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for LwwRegister<T> {}

impl<T> PartialEq for LwwRegister<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for LwwRegister<T> {}

impl<T> fmt::Debug for LwwRegister<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LwwRegister").field(&self.id).finish()
    }
}

impl<T> BorshSerialize for LwwRegister<T> {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.id.serialize(writer)
    }
}

impl<T> BorshDeserialize for LwwRegister<T> {
    fn deserialize_reader<R: Read>(reader: &mut R) -> IoResult<Self> {
        CollectionId::deserialize_reader(reader).map(Self::from_id)
    }
}

impl<T> StorageValue for LwwRegister<T> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Ref(CollectionRef {
            kind: CrdtKind::LwwRegister,
            id: self.id,
        })
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Ref(CollectionRef {
                kind: CrdtKind::LwwRegister,
                id,
            }) => Ok(Self::from_id(id)),
            other => Err(unexpected("register reference", &other)),
        }
    }
}

impl<T> Mergeable for LwwRegister<T> {
    fn merge(&mut self, _other: &Self) {}
}
