//! Per-user storage keyed by public key.

use core::fmt;
use core::marker::PhantomData;

use borsh::io::{Read, Result as IoResult, Write};
use borsh::{BorshDeserialize, BorshSerialize};
use meld_primitives::crdt::{CrdtKind, Mergeable};
use meld_primitives::id::{CollectionId, PublicKey};
use meld_primitives::value::{CollectionRef, StoredValue};
use meld_sdk::env;

use super::{decode_stored, record_delete, record_update, track_children};
use crate::errors::StorageError;
use crate::stored::{unexpected, StorageValue};

/// A map whose key space is constrained to 32-byte public keys.
///
/// Otherwise identical to [`UnorderedMap`](super::UnorderedMap): per-key
/// last-writer-wins with mergeable-value handling on insert.
pub struct UserStorage<V> {
    id: CollectionId,
    _priv: PhantomData<V>,
}

impl<V> UserStorage<V> {
    /// Creates an empty store with a fresh host-assigned id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(env::map_new())
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

impl<V: StorageValue> UserStorage<V> {
    /// Inserts a value for a user. Returns the previous value, if any.
    pub fn insert(&mut self, key: PublicKey, value: V) -> Result<Option<V>, StorageError> {
        let key_bytes = key.as_bytes();
        let mut stored = value.to_stored();
        if let Some(previous) = env::map_get(&self.id, key_bytes)? {
            stored = V::merge_stored(&StoredValue::from_slice(&previous)?, stored);
        }
        let value_bytes = stored.to_vec();
        let time = env::time_now();
        let previous = env::map_insert(&self.id, key_bytes, &value_bytes, time)?;
        record_update(
            self.id,
            CrdtKind::UserStorage,
            key_bytes,
            &stored,
            &value_bytes,
            time,
        );
        previous.as_deref().map(decode_stored).transpose()
    }

    pub fn get(&self, key: &PublicKey) -> Result<Option<V>, StorageError> {
        let Some(bytes) = env::map_get(&self.id, key.as_bytes())? else {
            return Ok(None);
        };
        let stored = StoredValue::from_slice(&bytes)?;
        track_children(self.id, CrdtKind::UserStorage, key.as_bytes(), &stored);
        V::from_stored(stored).map(Some)
    }

    /// Removes a user's value. Returns it, if any.
    pub fn remove(&mut self, key: &PublicKey) -> Result<Option<V>, StorageError> {
        let time = env::time_now();
        let previous = env::map_remove(&self.id, key.as_bytes(), time)?;
        record_delete(self.id, key.as_bytes(), time);
        previous.as_deref().map(decode_stored).transpose()
    }

    pub fn contains(&self, key: &PublicKey) -> Result<bool, StorageError> {
        Ok(env::map_contains(&self.id, key.as_bytes())?)
    }

    /// The live entries, materialized as a snapshot at the call point.
    pub fn entries(&self) -> Result<impl Iterator<Item = (PublicKey, V)>, StorageError> {
        let raw = env::map_iter(&self.id)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (key_bytes, value_bytes) in raw {
            let key = PublicKey::from_slice(&key_bytes)?;
            let stored = StoredValue::from_slice(&value_bytes)?;
            track_children(self.id, CrdtKind::UserStorage, &key_bytes, &stored);
            entries.push((key, V::from_stored(stored)?));
        }
        Ok(entries.into_iter())
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(env::map_len(&self.id)? as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry, tombstoning each key.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        let time = env::time_now();
        for (key_bytes, _) in env::map_iter(&self.id)? {
            record_delete(self.id, &key_bytes, time);
        }
        Ok(env::map_clear(&self.id, time)?)
    }
}

impl<V> Default for UserStorage<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for UserStorage<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for UserStorage<V> {}

impl<V> PartialEq for UserStorage<V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<V> Eq for UserStorage<V> {}

impl<V> fmt::Debug for UserStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserStorage").field(&self.id).finish()
    }
}

impl<V> BorshSerialize for UserStorage<V> {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.id.serialize(writer)
    }
}

impl<V> BorshDeserialize for UserStorage<V> {
    fn deserialize_reader<R: Read>(reader: &mut R) -> IoResult<Self> {
        CollectionId::deserialize_reader(reader).map(Self::from_id)
    }
}

impl<V> StorageValue for UserStorage<V> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Ref(CollectionRef {
            kind: CrdtKind::UserStorage,
            id: self.id,
        })
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Ref(CollectionRef {
                kind: CrdtKind::UserStorage,
                id,
            }) => Ok(Self::from_id(id)),
            other => Err(unexpected("user storage reference", &other)),
        }
    }
}

impl<V> Mergeable for UserStorage<V> {
    fn merge(&mut self, _other: &Self) {}
}
