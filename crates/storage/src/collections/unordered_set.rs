//! An add-wins set.

use core::borrow::Borrow;
use core::fmt;
use core::marker::PhantomData;

use borsh::io::{Read, Result as IoResult, Write};
use borsh::{BorshDeserialize, BorshSerialize};
use meld_primitives::crdt::{CrdtKind, Mergeable};
use meld_primitives::id::CollectionId;
use meld_primitives::value::{CollectionRef, StoredValue};
use meld_sdk::env;

use super::{key_bytes, record_delete, record_update};
use crate::errors::StorageError;
use crate::stored::{unexpected, StorageValue};

/// A handle to a replicated set.
///
/// Elements are borsh-encoded. Concurrent add and remove of the same
/// element resolve add-wins: a removal only sticks when it is strictly
/// later than every add it raced with.
pub struct UnorderedSet<T> {
    id: CollectionId,
    _priv: PhantomData<T>,
}

impl<T> UnorderedSet<T> {
    /// Creates an empty set with a fresh host-assigned id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(env::set_new())
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
}

impl<T: BorshSerialize> UnorderedSet<T> {
    /// Adds an element. Returns whether it was newly inserted.
    pub fn insert(&mut self, value: T) -> Result<bool, StorageError> {
        let element = key_bytes(&value)?;
        let time = env::time_now();
        let inserted = env::set_insert(&self.id, &element, time)?;
        record_update(
            self.id,
            CrdtKind::Set,
            &element,
            &StoredValue::Null,
            &StoredValue::Null.to_vec(),
            time,
        );
        Ok(inserted)
    }

    pub fn contains<Q>(&self, value: &Q) -> Result<bool, StorageError>
    where
        T: Borrow<Q>,
        Q: BorshSerialize + ?Sized,
    {
        Ok(env::set_contains(&self.id, &key_bytes(value)?)?)
    }

    /// Removes an element. Returns whether it was previously present.
    pub fn remove<Q>(&mut self, value: &Q) -> Result<bool, StorageError>
    where
        T: Borrow<Q>,
        Q: BorshSerialize + ?Sized,
    {
        let element = key_bytes(value)?;
        let time = env::time_now();
        let removed = env::set_remove(&self.id, &element, time)?;
        record_delete(self.id, &element, time);
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(env::set_len(&self.id)? as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// The set's live elements, materialized as a snapshot at the call
    /// point.
    pub fn iter(&self) -> Result<impl Iterator<Item = T>, StorageError>
    where
        T: BorshDeserialize,
    {
        let raw = env::set_iter(&self.id)?;
        let mut elements = Vec::with_capacity(raw.len());
        for bytes in raw {
            elements.push(borsh::from_slice(&bytes)?);
        }
        Ok(elements.into_iter())
    }

    /// Removes every element, tombstoning each one.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        let time = env::time_now();
        for element in env::set_iter(&self.id)? {
            record_delete(self.id, &element, time);
        }
        Ok(env::set_clear(&self.id, time)?)
    }
}

impl<T> Default for UnorderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for UnorderedSet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UnorderedSet<T> {}

impl<T> PartialEq for UnorderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for UnorderedSet<T> {}

impl<T> fmt::Debug for UnorderedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnorderedSet").field(&self.id).finish()
    }
}

impl<T> BorshSerialize for UnorderedSet<T> {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.id.serialize(writer)
    }
}

impl<T> BorshDeserialize for UnorderedSet<T> {
    fn deserialize_reader<R: Read>(reader: &mut R) -> IoResult<Self> {
        CollectionId::deserialize_reader(reader).map(Self::from_id)
    }
}

impl<T> StorageValue for UnorderedSet<T> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Ref(CollectionRef {
            kind: CrdtKind::Set,
            id: self.id,
        })
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Ref(CollectionRef {
                kind: CrdtKind::Set,
                id,
            }) => Ok(Self::from_id(id)),
            other => Err(unexpected("set reference", &other)),
        }
    }
}

impl<T> Mergeable for UnorderedSet<T> {
    fn merge(&mut self, _other: &Self) {}
}
