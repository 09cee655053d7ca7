//! A map with per-key last-writer-wins semantics.

use core::borrow::Borrow;
use core::fmt;
use core::marker::PhantomData;

use borsh::io::{Read, Result as IoResult, Write};
use borsh::{BorshDeserialize, BorshSerialize};
use meld_primitives::crdt::{CrdtKind, Mergeable};
use meld_primitives::id::CollectionId;
use meld_primitives::value::{CollectionRef, StoredValue};
use meld_sdk::env;

use super::{decode_stored, key_bytes, record_delete, record_update, track_children};
use crate::errors::StorageError;
use crate::stored::{unexpected, StorageValue};

/// A handle to a replicated map.
///
/// Keys are borsh-encoded; values use the self-describing storage
/// encoding. Inserting over an existing key merges the previous value
/// into the new one when the value type is mergeable, and overwrites
/// otherwise. Removals leave a tombstone so they win against older
/// concurrent writes from other replicas.
pub struct UnorderedMap<K, V> {
    id: CollectionId,
    _priv: PhantomData<(K, V)>,
}

impl<K, V> UnorderedMap<K, V> {
    /// Creates an empty map with a fresh host-assigned id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(env::map_new())
    }

    /// Wraps an existing collection id. The handle views the same data
    /// as every other handle carrying this id.
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

impl<K: BorshSerialize, V: StorageValue> UnorderedMap<K, V> {
    /// Inserts a key/value pair. Returns the previous value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, StorageError> {
        let key_bytes = key_bytes(&key)?;
        let mut stored = value.to_stored();
        if let Some(previous) = env::map_get(&self.id, &key_bytes)? {
            stored = V::merge_stored(&StoredValue::from_slice(&previous)?, stored);
        }
        let value_bytes = stored.to_vec();
        let time = env::time_now();
        let previous = env::map_insert(&self.id, &key_bytes, &value_bytes, time)?;
        record_update(self.id, CrdtKind::Map, &key_bytes, &stored, &value_bytes, time);
        previous.as_deref().map(decode_stored).transpose()
    }

    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>, StorageError>
    where
        K: Borrow<Q>,
        Q: BorshSerialize + ?Sized,
    {
        let key_bytes = key_bytes(key)?;
        let Some(bytes) = env::map_get(&self.id, &key_bytes)? else {
            return Ok(None);
        };
        let stored = StoredValue::from_slice(&bytes)?;
        track_children(self.id, CrdtKind::Map, &key_bytes, &stored);
        V::from_stored(stored).map(Some)
    }

    /// Removes a key. Returns the removed value, if any.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<Option<V>, StorageError>
    where
        K: Borrow<Q>,
        Q: BorshSerialize + ?Sized,
    {
        let key_bytes = key_bytes(key)?;
        let time = env::time_now();
        let previous = env::map_remove(&self.id, &key_bytes, time)?;
        record_delete(self.id, &key_bytes, time);
        previous.as_deref().map(decode_stored).transpose()
    }

    pub fn contains<Q>(&self, key: &Q) -> Result<bool, StorageError>
    where
        K: Borrow<Q>,
        Q: BorshSerialize + ?Sized,
    {
        Ok(env::map_contains(&self.id, &key_bytes(key)?)?)
    }

    /// The map's live entries, materialized as a snapshot at the call
    /// point. Mutating the map during iteration affects later reads,
    /// not this snapshot.
    pub fn entries(&self) -> Result<impl Iterator<Item = (K, V)>, StorageError>
    where
        K: BorshDeserialize,
    {
        let raw = env::map_iter(&self.id)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (key_bytes, value_bytes) in raw {
            let key = borsh::from_slice(&key_bytes)?;
            let stored = StoredValue::from_slice(&value_bytes)?;
            track_children(self.id, CrdtKind::Map, &key_bytes, &stored);
            entries.push((key, V::from_stored(stored)?));
        }
        Ok(entries.into_iter())
    }

    /// The map's live keys, materialized as a snapshot.
    pub fn keys(&self) -> Result<impl Iterator<Item = K>, StorageError>
    where
        K: BorshDeserialize,
    {
        let raw = env::map_iter(&self.id)?;
        let mut keys = Vec::with_capacity(raw.len());
        for (key_bytes, _) in raw {
            keys.push(borsh::from_slice(&key_bytes)?);
        }
        Ok(keys.into_iter())
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

impl<K, V> Default for UnorderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for UnorderedMap<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for UnorderedMap<K, V> {}

impl<K, V> PartialEq for UnorderedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K, V> Eq for UnorderedMap<K, V> {}

impl<K, V> fmt::Debug for UnorderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnorderedMap").field(&self.id).finish()
    }
}

// Handles persist as their bare id.
impl<K, V> BorshSerialize for UnorderedMap<K, V> {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.id.serialize(writer)
    }
}

impl<K, V> BorshDeserialize for UnorderedMap<K, V> {
    fn deserialize_reader<R: Read>(reader: &mut R) -> IoResult<Self> {
        CollectionId::deserialize_reader(reader).map(Self::from_id)
    }
}

impl<K, V> StorageValue for UnorderedMap<K, V> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Ref(CollectionRef {
            kind: CrdtKind::Map,
            id: self.id,
        })
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Ref(CollectionRef {
                kind: CrdtKind::Map,
                id,
            }) => Ok(Self::from_id(id)),
            other => Err(unexpected("map reference", &other)),
        }
    }
}

// Handles with the same id already view the same data; the entries
// themselves merge host-side.
impl<K, V> Mergeable for UnorderedMap<K, V> {
    fn merge(&mut self, _other: &Self) {}
}
