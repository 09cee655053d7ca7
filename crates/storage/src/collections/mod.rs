//! The collection handles.

pub mod counter;
pub mod frozen_storage;
pub mod lww_register;
pub mod unordered_map;
pub mod unordered_set;
pub mod user_storage;
pub mod vector;

pub use counter::{Counter, PnCounter};
pub use frozen_storage::{Frozen, FrozenStorage};
pub use lww_register::LwwRegister;
pub use unordered_map::UnorderedMap;
pub use unordered_set::UnorderedSet;
pub use user_storage::UserStorage;
pub use vector::Vector;

use borsh::BorshSerialize;
use meld_primitives::action::{Action, EntryRecord};
use meld_primitives::crdt::CrdtKind;
use meld_primitives::hlc::Hlc;
use meld_primitives::id::{CollectionId, EntryId};
use meld_primitives::value::StoredValue;
use meld_sdk::{delta, env};

use crate::errors::StorageError;
use crate::stored::StorageValue;

/// Borsh-encodes a key or set element.
pub(crate) fn key_bytes<Q: BorshSerialize + ?Sized>(key: &Q) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    key.serialize(&mut bytes)?;
    Ok(bytes)
}

/// Decodes a stored value payload into a typed value.
pub(crate) fn decode_stored<V: StorageValue>(bytes: &[u8]) -> Result<V, StorageError> {
    V::from_stored(StoredValue::from_slice(bytes)?)
}

/// Records a write: pushes the `Update` action carrying the full entry
/// record, registers parent edges for any nested collections inside the
/// value, and marks the collection dirty.
pub(crate) fn record_update(
    collection: CollectionId,
    crdt: CrdtKind,
    key: &[u8],
    stored: &StoredValue,
    value_bytes: &[u8],
    time: u64,
) {
    let record = EntryRecord {
        collection,
        crdt,
        key: key.to_vec(),
        value: value_bytes.to_vec(),
        hlc: Hlc::of(time, &env::executor_id()),
    };
    let data =
        borsh::to_vec(&record).unwrap_or_else(|_| env::panic_str("entry record serialization"));
    delta::push_action(Action::Update {
        id: record.entry_id(),
        time,
        data,
    });
    track_children(collection, crdt, key, stored);
    delta::touch(collection);
}

/// Records a removal: pushes the `DeleteRef` action and marks the
/// collection dirty.
pub(crate) fn record_delete(collection: CollectionId, key: &[u8], time: u64) {
    delta::push_action(Action::DeleteRef {
        id: EntryId::for_entry(&collection, key),
        time,
    });
    delta::touch(collection);
}

/// Registers parent edges for every collection reference inside a
/// value. Called on writes and on reads, so the nested graph survives a
/// cold start: handles rebuild their edges as values are rehydrated.
pub(crate) fn track_children(
    collection: CollectionId,
    crdt: CrdtKind,
    key: &[u8],
    stored: &StoredValue,
) {
    let mut refs = Vec::new();
    stored.collect_refs(&mut refs);
    if refs.is_empty() {
        return;
    }
    delta::register_children(
        &delta::ParentEntry {
            collection,
            crdt,
            key: key.to_vec(),
        },
        &refs,
    );
}
