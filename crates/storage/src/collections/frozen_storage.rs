//! Content-addressed immutable storage.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;

use borsh::io::{Read, Result as IoResult, Write};
use borsh::{BorshDeserialize, BorshSerialize};
use meld_primitives::crdt::{CrdtKind, Mergeable};
use meld_primitives::id::{CollectionId, ContentHash};
use meld_primitives::value::{CollectionRef, StoredValue};
use meld_sdk::env;

use super::{record_update, track_children};
use crate::errors::StorageError;
use crate::stored::{unexpected, StorageValue};

/// An immutable value. Merging two frozen values is a no-op: content
/// addressing guarantees both sides hold the same bytes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Frozen<T>(T);

impl<T> Frozen<T> {
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Frozen<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: StorageValue> StorageValue for Frozen<T> {
    fn to_stored(&self) -> StoredValue {
        self.0.to_stored()
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        T::from_stored(value).map(Frozen)
    }

    // Frozen values never change once written.
    fn merge_stored(previous: &StoredValue, _incoming: StoredValue) -> StoredValue {
        previous.clone()
    }
}

impl<T> Mergeable for Frozen<T> {
    fn merge(&mut self, _other: &Self) {}
}

/// A map keyed by the SHA-256 of each value's canonical serialization.
///
/// Adding is idempotent: the same value always lands at the same hash,
/// and a second add returns the hash without growing the store. Removal
/// is forbidden.
pub struct FrozenStorage<T> {
    id: CollectionId,
    _priv: PhantomData<T>,
}

impl<T> FrozenStorage<T> {
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

impl<T: BorshSerialize + StorageValue> FrozenStorage<T> {
    /// The hash `add` would store `value` under.
    pub fn compute_hash(value: &T) -> Result<ContentHash, StorageError> {
        Ok(ContentHash::digest(&borsh::to_vec(value)?))
    }

    /// Adds a value, returning its content hash. Idempotent: adding a
    /// value that is already present changes nothing.
    pub fn add(&mut self, value: T) -> Result<ContentHash, StorageError> {
        let hash = Self::compute_hash(&value)?;
        let key_bytes = hash.as_bytes();
        if env::map_contains(&self.id, key_bytes)? {
            return Ok(hash);
        }
        let stored = Frozen(value).to_stored();
        let value_bytes = stored.to_vec();
        let time = env::time_now();
        let _ = env::map_insert(&self.id, key_bytes, &value_bytes, time)?;
        record_update(
            self.id,
            CrdtKind::FrozenStorage,
            key_bytes,
            &stored,
            &value_bytes,
            time,
        );
        Ok(hash)
    }

    pub fn get(&self, hash: &ContentHash) -> Result<Option<Frozen<T>>, StorageError> {
        let Some(bytes) = env::map_get(&self.id, hash.as_bytes())? else {
            return Ok(None);
        };
        let stored = StoredValue::from_slice(&bytes)?;
        track_children(self.id, CrdtKind::FrozenStorage, hash.as_bytes(), &stored);
        Frozen::from_stored(stored).map(Some)
    }

    pub fn contains(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        Ok(env::map_contains(&self.id, hash.as_bytes())?)
    }

    /// Always fails: frozen storage never forgets.
    pub fn remove(&mut self, _hash: &ContentHash) -> Result<(), StorageError> {
        Err(StorageError::FrozenViolation)
    }

    /// The live entries, materialized as a snapshot at the call point.
    pub fn entries(&self) -> Result<impl Iterator<Item = (ContentHash, Frozen<T>)>, StorageError> {
        let raw = env::map_iter(&self.id)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (key_bytes, value_bytes) in raw {
            let hash = ContentHash::from_slice(&key_bytes)?;
            let stored = StoredValue::from_slice(&value_bytes)?;
            entries.push((hash, Frozen::from_stored(stored)?));
        }
        Ok(entries.into_iter())
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(env::map_len(&self.id)? as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl<T> Default for FrozenStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FrozenStorage<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FrozenStorage<T> {}

impl<T> PartialEq for FrozenStorage<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for FrozenStorage<T> {}

impl<T> fmt::Debug for FrozenStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FrozenStorage").field(&self.id).finish()
    }
}

impl<T> BorshSerialize for FrozenStorage<T> {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        self.id.serialize(writer)
    }
}

impl<T> BorshDeserialize for FrozenStorage<T> {
    fn deserialize_reader<R: Read>(reader: &mut R) -> IoResult<Self> {
        CollectionId::deserialize_reader(reader).map(Self::from_id)
    }
}

impl<T> StorageValue for FrozenStorage<T> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Ref(CollectionRef {
            kind: CrdtKind::FrozenStorage,
            id: self.id,
        })
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Ref(CollectionRef {
                kind: CrdtKind::FrozenStorage,
                id,
            }) => Ok(Self::from_id(id)),
            other => Err(unexpected("frozen storage reference", &other)),
        }
    }
}

impl<V> Mergeable for FrozenStorage<V> {
    fn merge(&mut self, _other: &Self) {}
}
