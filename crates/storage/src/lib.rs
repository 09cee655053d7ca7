//! CRDT collections for meld applications.
//!
//! Every collection is a *handle*: a copyable wrapper around a 32-byte
//! collection id. The data itself lives behind the host bridge; each
//! operation is a host round trip, and each mutation is simultaneously
//! recorded with the SDK's delta recorder so it replicates to peers.
//! Two handles with the same id view the same data, and a handle
//! deserialized from storage is as good as the one that created the
//! collection.

pub mod collections;

mod errors;
mod stored;

pub use collections::{
    Counter, Frozen, FrozenStorage, LwwRegister, PnCounter, UnorderedMap, UnorderedSet,
    UserStorage, Vector,
};
pub use errors::StorageError;
pub use stored::{Blob, StorageValue};

// The wire-level vocabulary collections speak.
pub use meld_primitives::{
    CollectionId, ContentHash, ExecutorId, Hlc, Mergeable, PublicKey, StoredValue,
};

#[cfg(test)]
mod tests;
