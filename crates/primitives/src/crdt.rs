//! CRDT classification and the merge contract.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// The kind of a CRDT collection.
///
/// The numeric tag is part of the wire format: it appears inside
/// collection references in the self-describing codec and inside entry
/// records in delta artifacts.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CrdtKind {
    Map,
    Set,
    Vector,
    Counter,
    LwwRegister,
    UserStorage,
    FrozenStorage,
}

impl CrdtKind {
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Map => 0,
            Self::Set => 1,
            Self::Vector => 2,
            Self::Counter => 3,
            Self::LwwRegister => 4,
            Self::UserStorage => 5,
            Self::FrozenStorage => 6,
        }
    }

    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Map),
            1 => Some(Self::Set),
            2 => Some(Self::Vector),
            3 => Some(Self::Counter),
            4 => Some(Self::LwwRegister),
            5 => Some(Self::UserStorage),
            6 => Some(Self::FrozenStorage),
            _ => None,
        }
    }

    /// Whether entries of this kind are laid out like map entries.
    ///
    /// User storage and frozen storage reuse the map entry layout; only
    /// their key space differs.
    #[must_use]
    pub const fn is_map_like(self) -> bool {
        matches!(self, Self::Map | Self::UserStorage | Self::FrozenStorage)
    }
}

/// A type that can be merged with a concurrent copy of itself.
///
/// Implementations must be commutative, associative, and idempotent:
/// applying any interleaving of the same set of merges on any replica has
/// to converge on the same value. These laws are what let replicas
/// exchange state without coordination.
pub trait Mergeable {
    fn merge(&mut self, other: &Self);
}
