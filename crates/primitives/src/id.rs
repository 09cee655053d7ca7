//! Fixed-width identifiers.
//!
//! Every identity in the engine is an opaque 32-byte value. The textual
//! form is always 64 lowercase hex characters; anything else is rejected
//! so that round-tripping through text cannot change a value's identity.

use core::fmt;
use core::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure to parse a 32-byte identifier from its textual or sliced form.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ParseIdError {
    #[error("identifier must be exactly 32 bytes")]
    InvalidLength,
    #[error("identifier must be 64 lowercase hex characters")]
    InvalidHex,
}

macro_rules! id32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd,
            BorshSerialize, BorshDeserialize,
        )]
        pub struct $name([u8; 32]);

        impl $name {
            /// Width of the identifier in bytes.
            pub const LENGTH: usize = 32;

            #[must_use]
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            #[must_use]
            pub const fn into_bytes(self) -> [u8; 32] {
                self.0
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseIdError> {
                let bytes: [u8; 32] =
                    bytes.try_into().map_err(|_| ParseIdError::InvalidLength)?;
                Ok(Self(bytes))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; 32] {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 64 {
                    return Err(ParseIdError::InvalidHex);
                }
                if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
                    return Err(ParseIdError::InvalidHex);
                }
                let bytes = hex::decode(s).map_err(|_| ParseIdError::InvalidHex)?;
                Self::from_slice(&bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(D::Error::custom)
            }
        }
    };
}

id32! {
    /// Identity of a CRDT collection, assigned by the host at creation.
    CollectionId
}

id32! {
    /// Identity of the replicated state group an invocation belongs to.
    ContextId
}

id32! {
    /// Identity of the caller of the current invocation.
    ExecutorId
}

id32! {
    /// Content identifier of out-of-band binary data.
    BlobId
}

id32! {
    /// Context-addressed identity of a single collection entry, derived
    /// from the owning collection and the entry key.
    EntryId
}

id32! {
    /// A 32-byte public key, used as the key space of user storage.
    PublicKey
}

id32! {
    /// SHA-256 digest of a canonically serialized value.
    ContentHash
}

impl ExecutorId {
    /// The 16-byte prefix used as the node component of hybrid logical
    /// clock timestamps.
    #[must_use]
    pub fn node_prefix(&self) -> [u8; 16] {
        let mut prefix = [0; 16];
        prefix.copy_from_slice(&self.0[..16]);
        prefix
    }
}

impl EntryId {
    /// Derives the entry identity for `key` within `collection`.
    ///
    /// The derivation is pure, so any replica that knows the collection
    /// and the key addresses the same entry.
    #[must_use]
    pub fn for_entry(collection: &CollectionId, key: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(collection.as_bytes());
        hasher.update(key);
        Self(hasher.finalize().into())
    }
}

impl ContentHash {
    /// SHA-256 over `bytes`.
    #[must_use]
    pub fn digest(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

#[cfg(test)]
mod tests {
    use claims::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn hex_round_trip() {
        let id = CollectionId::new([0xab; 32]);
        let text = id.to_string();
        assert_eq!(text.len(), 64, "identifiers render as 64 hex characters");
        assert_eq!(assert_ok!(text.parse::<CollectionId>()), id);
    }

    #[test]
    fn uppercase_hex_rejected() {
        let text = "AB".repeat(32);
        assert_err!(text.parse::<CollectionId>());
    }

    #[test]
    fn wrong_length_rejected() {
        assert_err!("abcd".parse::<CollectionId>());
        assert_err!(CollectionId::from_slice(&[0; 31]));
        assert_err!(CollectionId::from_slice(&[0; 33]));
    }

    #[test]
    fn node_prefix_is_first_half() {
        let mut bytes = [0; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let executor = ExecutorId::new(bytes);
        assert_eq!(executor.node_prefix(), bytes[..16], "prefix must match");
    }

    #[test]
    fn entry_id_is_deterministic() {
        let collection = CollectionId::new([1; 32]);
        let a = EntryId::for_entry(&collection, b"key");
        let b = EntryId::for_entry(&collection, b"key");
        assert_eq!(a, b, "same inputs must derive the same entry");

        let other = EntryId::for_entry(&collection, b"other");
        assert_ne!(a, other, "different keys must derive different entries");
    }
}
