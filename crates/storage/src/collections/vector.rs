//! An append-mostly ordered sequence.

use core::fmt;
use core::marker::PhantomData;

use borsh::io::{Read, Result as IoResult, Write};
use borsh::{BorshDeserialize, BorshSerialize};
use meld_primitives::crdt::{CrdtKind, Mergeable};
use meld_primitives::id::CollectionId;
use meld_primitives::store::vector_key;
use meld_primitives::value::{CollectionRef, StoredValue};
use meld_sdk::env;

use super::{decode_stored, record_delete, record_update, track_children};
use crate::errors::StorageError;
use crate::stored::{unexpected, StorageValue};

/// A handle to a replicated vector.
///
/// There is no insert-at or remove-at: editing is expressed by reading
/// everything, building a fresh vector, and replacing it atomically
/// (typically through an [`LwwRegister`](super::LwwRegister)). Across
/// replicas each index is an independent last-writer-wins slot and the
/// longer replica's tail survives a merge.
pub struct Vector<T> {
    id: CollectionId,
    _priv: PhantomData<T>,
}

impl<T> Vector<T> {
    /// Creates an empty vector with a fresh host-assigned id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(env::vector_new())
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

impl<T: StorageValue> Vector<T> {
    /// Appends a value.
    pub fn push(&mut self, value: T) -> Result<(), StorageError> {
        let stored = value.to_stored();
        let value_bytes = stored.to_vec();
        let time = env::time_now();
        let index = env::vector_push(&self.id, &value_bytes, time)?;
        record_update(
            self.id,
            CrdtKind::Vector,
            &vector_key(index),
            &stored,
            &value_bytes,
            time,
        );
        Ok(())
    }

    /// The value at `index`. Fails with
    /// [`OutOfBounds`](StorageError::OutOfBounds) when `index >= len`.
    pub fn get(&self, index: usize) -> Result<T, StorageError> {
        let (raw, bytes) = env::vector_get(&self.id, index as u64)?
            .ok_or(StorageError::OutOfBounds {
                index: index as u64,
            })?;
        let stored = StoredValue::from_slice(&bytes)?;
        track_children(self.id, CrdtKind::Vector, &vector_key(raw), &stored);
        T::from_stored(stored)
    }

    /// Replaces the value at `index`, returning the previous value.
    /// Fails with [`OutOfBounds`](StorageError::OutOfBounds) when
    /// `index >= len`.
    pub fn update(&mut self, index: usize, value: T) -> Result<T, StorageError> {
        let stored = value.to_stored();
        let value_bytes = stored.to_vec();
        let time = env::time_now();
        let (raw, previous) = env::vector_update(&self.id, index as u64, &value_bytes, time)?
            .ok_or(StorageError::OutOfBounds {
                index: index as u64,
            })?;
        record_update(
            self.id,
            CrdtKind::Vector,
            &vector_key(raw),
            &stored,
            &value_bytes,
            time,
        );
        decode_stored(&previous)
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Result<Option<T>, StorageError> {
        let time = env::time_now();
        let Some((raw, bytes)) = env::vector_pop(&self.id, time)? else {
            return Ok(None);
        };
        record_delete(self.id, &vector_key(raw), time);
        decode_stored(&bytes).map(Some)
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(env::vector_len(&self.id)? as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// The vector's elements in order, materialized as a snapshot at
    /// the call point.
    pub fn iter(&self) -> Result<impl Iterator<Item = T>, StorageError> {
        let len = self.len()?;
        let mut items = Vec::with_capacity(len);
        for position in 0..len {
            items.push(self.get(position)?);
        }
        Ok(items.into_iter())
    }

    /// Whether any element equals `value`, compared in stored form.
    pub fn contains(&self, value: &T) -> Result<bool, StorageError> {
        let needle = value.to_stored();
        let len = self.len()?;
        for position in 0..len {
            let Some((_, bytes)) = env::vector_get(&self.id, position as u64)? else {
                continue;
            };
            if StoredValue::from_slice(&bytes)? == needle {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Removes every element, tombstoning each slot.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        let time = env::time_now();
        let len = self.len()?;
        for position in 0..len {
            if let Some((raw, _)) = env::vector_get(&self.id, position as u64)? {
                record_delete(self.id, &vector_key(raw), time);
            }
        }
        Ok(env::vector_clear(&self.id, time)?)
    }
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Vector<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Vector<T> {}

impl<T> PartialEq for Vector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Vector<T> {}

impl<T> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Vector").field(&self.id).finish()
    }
}

impl<T> BorshSerialize for Vector<T> {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.id.serialize(writer)
    }
}

impl<T> BorshDeserialize for Vector<T> {
    fn deserialize_reader<R: Read>(reader: &mut R) -> IoResult<Self> {
        CollectionId::deserialize_reader(reader).map(Self::from_id)
    }
}

impl<T> StorageValue for Vector<T> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Ref(CollectionRef {
            kind: CrdtKind::Vector,
            id: self.id,
        })
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Ref(CollectionRef {
                kind: CrdtKind::Vector,
                id,
            }) => Ok(Self::from_id(id)),
            other => Err(unexpected("vector reference", &other)),
        }
    }
}

impl<T> Mergeable for Vector<T> {
    fn merge(&mut self, _other: &Self) {}
}
