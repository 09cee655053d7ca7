//! Self-describing storage values.
//!
//! Values held inside collections are encoded with a one-byte kind tag in
//! front of each node, so a decoder needs no external type information.
//! This matters in two places: the host merges entry payloads it has no
//! Rust types for, and collection handles survive storage round trips as
//! first-class references that can be rehydrated on read.

use thiserror::Error;

use crate::crdt::CrdtKind;
use crate::id::CollectionId;

/// Hard recursion limit for the decoder.
///
/// Storage values are trees; anything deeper than this is either corrupt
/// or hostile input.
const MAX_DEPTH: usize = 128;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_U64: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_BYTES: u8 = 4;
const TAG_LIST: u8 = 5;
const TAG_MAP: u8 = 6;
const TAG_COLLECTION_REF: u8 = 7;

/// A reference to a CRDT collection embedded inside a stored value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CollectionRef {
    pub kind: CrdtKind,
    pub id: CollectionId,
}

/// A decoded self-describing value.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredValue {
    Null,
    Bool(bool),
    U64(u64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<StoredValue>),
    Map(Vec<(StoredValue, StoredValue)>),
    Ref(CollectionRef),
}

/// Malformed bytes encountered by the self-describing decoder.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum StoredValueError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown value tag {0}")]
    UnknownTag(u8),
    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown collection kind tag {0}")]
    UnknownCollectionKind(u8),
    #[error("value nesting exceeds the supported depth")]
    DepthLimit,
    #[error("trailing bytes after value")]
    TrailingBytes,
}

impl StoredValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Encodes the value into its wire form.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Null => out.push(TAG_NULL),
            Self::Bool(value) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*value));
            }
            Self::U64(value) => {
                out.push(TAG_U64);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Self::String(value) => {
                out.push(TAG_STRING);
                encode_len_prefixed(out, value.as_bytes());
            }
            Self::Bytes(value) => {
                out.push(TAG_BYTES);
                encode_len_prefixed(out, value);
            }
            Self::List(items) => {
                out.push(TAG_LIST);
                out.extend_from_slice(&u32_len(items.len()).to_le_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
            Self::Map(entries) => {
                out.push(TAG_MAP);
                out.extend_from_slice(&u32_len(entries.len()).to_le_bytes());
                for (key, value) in entries {
                    key.encode_into(out);
                    value.encode_into(out);
                }
            }
            Self::Ref(reference) => {
                out.push(TAG_COLLECTION_REF);
                out.push(reference.kind.tag());
                out.extend_from_slice(reference.id.as_bytes());
            }
        }
    }

    /// Decodes a value, requiring the input to be fully consumed.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StoredValueError> {
        let mut reader = Reader(bytes);
        let value = Self::decode(&mut reader, 0)?;
        if reader.0.is_empty() {
            Ok(value)
        } else {
            Err(StoredValueError::TrailingBytes)
        }
    }

    fn decode(reader: &mut Reader<'_>, depth: usize) -> Result<Self, StoredValueError> {
        if depth > MAX_DEPTH {
            return Err(StoredValueError::DepthLimit);
        }
        let tag = reader.byte()?;
        match tag {
            TAG_NULL => Ok(Self::Null),
            TAG_BOOL => match reader.byte()? {
                0 => Ok(Self::Bool(false)),
                1 => Ok(Self::Bool(true)),
                other => Err(StoredValueError::InvalidBool(other)),
            },
            TAG_U64 => Ok(Self::U64(u64::from_le_bytes(reader.array()?))),
            TAG_STRING => {
                let bytes = reader.len_prefixed()?;
                String::from_utf8(bytes.to_vec())
                    .map(Self::String)
                    .map_err(|_| StoredValueError::InvalidUtf8)
            }
            TAG_BYTES => Ok(Self::Bytes(reader.len_prefixed()?.to_vec())),
            TAG_LIST => {
                let count = u32::from_le_bytes(reader.array()?);
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(Self::decode(reader, depth.saturating_add(1))?);
                }
                Ok(Self::List(items))
            }
            TAG_MAP => {
                let count = u32::from_le_bytes(reader.array()?);
                let mut entries = Vec::new();
                for _ in 0..count {
                    let key = Self::decode(reader, depth.saturating_add(1))?;
                    let value = Self::decode(reader, depth.saturating_add(1))?;
                    entries.push((key, value));
                }
                Ok(Self::Map(entries))
            }
            TAG_COLLECTION_REF => {
                let kind_tag = reader.byte()?;
                let kind = CrdtKind::from_tag(kind_tag)
                    .ok_or(StoredValueError::UnknownCollectionKind(kind_tag))?;
                let id = CollectionId::new(reader.array()?);
                Ok(Self::Ref(CollectionRef { kind, id }))
            }
            other => Err(StoredValueError::UnknownTag(other)),
        }
    }

    /// Collects every collection reference reachable from this value.
    ///
    /// Used by the delta recorder to maintain parent→child edges for
    /// nested collections.
    pub fn collect_refs(&self, out: &mut Vec<CollectionRef>) {
        match self {
            Self::Null | Self::Bool(_) | Self::U64(_) | Self::String(_) | Self::Bytes(_) => {}
            Self::List(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Self::Map(entries) => {
                for (key, value) in entries {
                    key.collect_refs(out);
                    value.collect_refs(out);
                }
            }
            Self::Ref(reference) => out.push(*reference),
        }
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8, StoredValueError> {
        let (first, rest) = self.0.split_first().ok_or(StoredValueError::UnexpectedEof)?;
        self.0 = rest;
        Ok(*first)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StoredValueError> {
        let bytes = self.take(N)?;
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], StoredValueError> {
        if self.0.len() < count {
            return Err(StoredValueError::UnexpectedEof);
        }
        let (taken, rest) = self.0.split_at(count);
        self.0 = rest;
        Ok(taken)
    }

    fn len_prefixed(&mut self) -> Result<&'a [u8], StoredValueError> {
        let len = u32::from_le_bytes(self.array()?);
        self.take(len as usize)
    }
}

fn encode_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&u32_len(bytes.len()).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn u32_len(len: usize) -> u32 {
    u32::try_from(len).expect("value length exceeds the u32 wire limit")
}
