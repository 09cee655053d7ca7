//! Mutation actions and the delta artifact wire format.
//!
//! An invocation's mutations are recorded as a flat sequence of actions
//! and serialized into an artifact:
//!
//! ```text
//! Artifact  := u32 action_count, Action*
//! Action    := u8 kind_tag, id[32], payload
//!   kind 1 (Update):    u64 timestamp_le, u32 len, data[len]
//!   kind 2 (DeleteRef): u64 timestamp_le
//! ```
//!
//! The artifact's root hash is the SHA-256 digest of the serialized
//! bytes, which is what the host disseminates peer to peer. Update
//! payloads carry a full [`EntryRecord`] so a receiving replica can place
//! and merge entries it has never seen.

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use crate::crdt::CrdtKind;
use crate::hlc::Hlc;
use crate::id::{CollectionId, EntryId};

const UPDATE_TAG: u8 = 1;
const DELETE_REF_TAG: u8 = 2;

/// A single recorded mutation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// A write to a collection entry. `data` is a borsh [`EntryRecord`].
    Update {
        id: EntryId,
        time: u64,
        data: Vec<u8>,
    },
    /// A removal of a collection entry, leaving a tombstone at `time`.
    DeleteRef { id: EntryId, time: u64 },
}

impl Action {
    #[must_use]
    pub const fn id(&self) -> &EntryId {
        match self {
            Self::Update { id, .. } | Self::DeleteRef { id, .. } => id,
        }
    }

    #[must_use]
    pub const fn time(&self) -> u64 {
        match self {
            Self::Update { time, .. } | Self::DeleteRef { time, .. } => *time,
        }
    }
}

/// The payload of an [`Action::Update`].
///
/// Everything a replica needs to apply the write without prior knowledge
/// of the entry: the owning collection, its kind, the entry key within
/// the collection, the self-describing value bytes, and the full HLC of
/// the write (the action header only carries physical time).
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct EntryRecord {
    pub collection: CollectionId,
    pub crdt: CrdtKind,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub hlc: Hlc,
}

impl EntryRecord {
    /// The context-addressed identity of this entry.
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        EntryId::for_entry(&self.collection, &self.key)
    }
}

/// Malformed artifact bytes.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ArtifactError {
    #[error("artifact is truncated")]
    Truncated,
    #[error("unknown action tag {0}")]
    UnknownActionTag(u8),
    #[error("trailing bytes after the last action")]
    TrailingBytes,
}

/// Serializes `actions` into artifact bytes.
#[must_use]
pub fn encode_artifact(actions: &[Action]) -> Vec<u8> {
    let count = u32::try_from(actions.len()).expect("action count exceeds the u32 wire limit");
    let mut out = Vec::new();
    out.extend_from_slice(&count.to_le_bytes());
    for action in actions {
        match action {
            Action::Update { id, time, data } => {
                out.push(UPDATE_TAG);
                out.extend_from_slice(id.as_bytes());
                out.extend_from_slice(&time.to_le_bytes());
                let len =
                    u32::try_from(data.len()).expect("payload length exceeds the u32 wire limit");
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(data);
            }
            Action::DeleteRef { id, time } => {
                out.push(DELETE_REF_TAG);
                out.extend_from_slice(id.as_bytes());
                out.extend_from_slice(&time.to_le_bytes());
            }
        }
    }
    out
}

/// Parses artifact bytes back into actions.
pub fn decode_artifact(bytes: &[u8]) -> Result<Vec<Action>, ArtifactError> {
    let mut reader = bytes;
    let count = u32::from_le_bytes(take_array(&mut reader)?);
    let mut actions = Vec::new();
    for _ in 0..count {
        let tag = take_array::<1>(&mut reader)?[0];
        let id = EntryId::new(take_array(&mut reader)?);
        let time = u64::from_le_bytes(take_array(&mut reader)?);
        match tag {
            UPDATE_TAG => {
                let len = u32::from_le_bytes(take_array(&mut reader)?) as usize;
                let data = take(&mut reader, len)?.to_vec();
                actions.push(Action::Update { id, time, data });
            }
            DELETE_REF_TAG => actions.push(Action::DeleteRef { id, time }),
            other => return Err(ArtifactError::UnknownActionTag(other)),
        }
    }
    if reader.is_empty() {
        Ok(actions)
    } else {
        Err(ArtifactError::TrailingBytes)
    }
}

/// The 32-byte content digest of an artifact.
#[must_use]
pub fn root_hash(artifact: &[u8]) -> [u8; 32] {
    *crate::id::ContentHash::digest(artifact).as_bytes()
}

fn take<'a>(reader: &mut &'a [u8], count: usize) -> Result<&'a [u8], ArtifactError> {
    if reader.len() < count {
        return Err(ArtifactError::Truncated);
    }
    let (taken, rest) = reader.split_at(count);
    *reader = rest;
    Ok(taken)
}

fn take_array<const N: usize>(reader: &mut &[u8]) -> Result<[u8; N], ArtifactError> {
    let bytes = take(reader, N)?;
    let mut out = [0; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use claims::{assert_err, assert_ok};

    use super::*;

    fn sample_actions() -> Vec<Action> {
        vec![
            Action::Update {
                id: EntryId::new([1; 32]),
                time: 10,
                data: vec![0xde, 0xad],
            },
            Action::DeleteRef {
                id: EntryId::new([2; 32]),
                time: 11,
            },
        ]
    }

    #[test]
    fn artifact_round_trip() {
        let actions = sample_actions();
        let bytes = encode_artifact(&actions);
        assert_eq!(assert_ok!(decode_artifact(&bytes)), actions);
    }

    #[test]
    fn artifact_layout_is_fixed() {
        let actions = vec![Action::Update {
            id: EntryId::new([7; 32]),
            time: 0x0102,
            data: vec![0xaa],
        }];
        let bytes = encode_artifact(&actions);

        let mut expected = vec![1, 0, 0, 0]; // action count
        expected.push(1); // update tag
        expected.extend_from_slice(&[7; 32]); // entry id
        expected.extend_from_slice(&0x0102u64.to_le_bytes()); // timestamp
        expected.extend_from_slice(&[1, 0, 0, 0]); // payload length
        expected.push(0xaa); // payload
        assert_eq!(bytes, expected, "the wire layout is a replication contract");
    }

    #[test]
    fn empty_artifact_is_four_zero_bytes() {
        assert_eq!(encode_artifact(&[]), [0, 0, 0, 0], "just the count");
    }

    #[test]
    fn truncated_artifact_rejected() {
        let bytes = encode_artifact(&sample_actions());
        assert_err!(decode_artifact(&bytes[..bytes.len() - 1]));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode_artifact(&sample_actions());
        bytes.push(0);
        assert_eq!(decode_artifact(&bytes), Err(ArtifactError::TrailingBytes));
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut bytes = vec![1, 0, 0, 0];
        bytes.push(9);
        bytes.extend_from_slice(&[0; 40]);
        assert_eq!(decode_artifact(&bytes), Err(ArtifactError::UnknownActionTag(9)));
    }

    #[test]
    fn root_hash_is_content_addressed() {
        let a = encode_artifact(&sample_actions());
        let b = encode_artifact(&sample_actions());
        assert_eq!(root_hash(&a), root_hash(&b), "same bytes, same hash");

        let other = encode_artifact(&[]);
        assert_ne!(root_hash(&a), root_hash(&other), "different bytes differ");
    }

    #[test]
    fn entry_record_round_trip() {
        let record = EntryRecord {
            collection: CollectionId::new([4; 32]),
            crdt: CrdtKind::Map,
            key: b"key".to_vec(),
            value: vec![0],
            hlc: Hlc::new(5, [6; 16]),
        };
        let bytes = borsh::to_vec(&record).expect("serialize failed");
        let decoded: EntryRecord = borsh::from_slice(&bytes).expect("deserialize failed");
        assert_eq!(decoded, record, "entry records are borsh round-trippable");
        assert_eq!(
            record.entry_id(),
            EntryId::for_entry(&record.collection, b"key"),
            "entry identity is derived from collection and key",
        );
    }
}
