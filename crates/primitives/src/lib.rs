//! Shared wire types for the meld engine.
//!
//! Everything that crosses a replica boundary lives here: 32-byte
//! identifiers, the hybrid logical clock, the action/artifact codec, the
//! self-describing storage value codec, and the byte-level collection
//! states with their merge rules. Both the guest-side SDK and the host
//! embed this crate, which is what keeps two independently executing
//! replicas byte-compatible.

pub mod action;
pub mod crdt;
pub mod hlc;
pub mod id;
pub mod store;
pub mod value;

pub use action::{decode_artifact, encode_artifact, root_hash, Action, ArtifactError, EntryRecord};
pub use crdt::{CrdtKind, Mergeable};
pub use hlc::Hlc;
pub use id::{
    BlobId, CollectionId, ContentHash, ContextId, EntryId, ExecutorId, ParseIdError, PublicKey,
};
pub use value::{CollectionRef, StoredValue, StoredValueError};
