//! Conversion between Rust values and self-describing stored values.

use core::ops::Deref;
use std::collections::BTreeMap;

use meld_primitives::value::StoredValue;

use crate::errors::StorageError;

/// A type that can live inside a collection.
///
/// Values convert to and from the self-describing storage encoding.
/// `merge_stored` is the hook that makes a value *mergeable*: when an
/// insert finds an existing value at the same position, the previous
/// stored form is merged into the incoming one instead of being
/// overwritten. The default keeps the incoming value (plain
/// last-writer-wins); collection handles and domain records override it.
pub trait StorageValue: Sized {
    fn to_stored(&self) -> StoredValue;

    fn from_stored(value: StoredValue) -> Result<Self, StorageError>;

    #[must_use]
    fn merge_stored(previous: &StoredValue, incoming: StoredValue) -> StoredValue {
        let _ = previous;
        incoming
    }
}

pub(crate) fn kind_name(value: &StoredValue) -> &'static str {
    match value {
        StoredValue::Null => "null",
        StoredValue::Bool(_) => "bool",
        StoredValue::U64(_) => "u64",
        StoredValue::String(_) => "string",
        StoredValue::Bytes(_) => "bytes",
        StoredValue::List(_) => "list",
        StoredValue::Map(_) => "map",
        StoredValue::Ref(_) => "collection reference",
    }
}

pub(crate) fn unexpected(expected: &str, found: &StoredValue) -> StorageError {
    StorageError::Deserialization(format!("expected {expected}, found {}", kind_name(found)))
}

impl StorageValue for bool {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Bool(*self)
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Bool(value) => Ok(value),
            other => Err(unexpected("bool", &other)),
        }
    }
}

impl StorageValue for String {
    fn to_stored(&self) -> StoredValue {
        StoredValue::String(self.clone())
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::String(value) => Ok(value),
            other => Err(unexpected("string", &other)),
        }
    }
}

macro_rules! impl_unsigned {
    ($($ty:ty),+) => {
        $(
            impl StorageValue for $ty {
                fn to_stored(&self) -> StoredValue {
                    StoredValue::U64(u64::from(*self))
                }

                fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
                    match value {
                        StoredValue::U64(value) => {
                            <$ty>::try_from(value).map_err(|_| {
                                StorageError::Deserialization(format!(
                                    "{value} does not fit in {}",
                                    stringify!($ty),
                                ))
                            })
                        }
                        other => Err(unexpected(stringify!($ty), &other)),
                    }
                }
            }
        )+
    };
}

impl_unsigned!(u8, u16, u32, u64);

macro_rules! impl_signed {
    ($($ty:ty),+) => {
        $(
            impl StorageValue for $ty {
                // Stored in two's complement inside the u64 slot.
                fn to_stored(&self) -> StoredValue {
                    StoredValue::U64(i64::from(*self) as u64)
                }

                fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
                    match value {
                        StoredValue::U64(value) => {
                            <$ty>::try_from(value as i64).map_err(|_| {
                                StorageError::Deserialization(format!(
                                    "{} does not fit in {}",
                                    value as i64,
                                    stringify!($ty),
                                ))
                            })
                        }
                        other => Err(unexpected(stringify!($ty), &other)),
                    }
                }
            }
        )+
    };
}

impl_signed!(i8, i16, i32, i64);

/// Raw bytes. A newtype rather than `Vec<u8>` so byte strings and lists
/// of integers stay distinct in the stored encoding.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Blob(pub Vec<u8>);

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl StorageValue for Blob {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Bytes(self.0.clone())
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Bytes(bytes) => Ok(Self(bytes)),
            other => Err(unexpected("bytes", &other)),
        }
    }
}

macro_rules! impl_id32 {
    ($($ty:ty),+) => {
        $(
            impl StorageValue for $ty {
                fn to_stored(&self) -> StoredValue {
                    StoredValue::Bytes(self.as_bytes().to_vec())
                }

                fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
                    match value {
                        StoredValue::Bytes(bytes) => {
                            <$ty>::from_slice(&bytes).map_err(StorageError::from)
                        }
                        other => Err(unexpected("32-byte identifier", &other)),
                    }
                }
            }
        )+
    };
}

impl_id32!(
    meld_primitives::BlobId,
    meld_primitives::ContentHash,
    meld_primitives::PublicKey
);

impl<T: StorageValue> StorageValue for Vec<T> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::List(self.iter().map(StorageValue::to_stored).collect())
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::List(items) => items.into_iter().map(T::from_stored).collect(),
            other => Err(unexpected("list", &other)),
        }
    }
}

/// Absence maps to `Null`. Nesting options flattens: `Some(None)` and
/// `None` store identically.
impl<T: StorageValue> StorageValue for Option<T> {
    fn to_stored(&self) -> StoredValue {
        match self {
            Some(value) => value.to_stored(),
            None => StoredValue::Null,
        }
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Null => Ok(None),
            other => T::from_stored(other).map(Some),
        }
    }
}

impl<A: StorageValue, B: StorageValue> StorageValue for (A, B) {
    fn to_stored(&self) -> StoredValue {
        StoredValue::List(vec![self.0.to_stored(), self.1.to_stored()])
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::List(items) => {
                let mut items = items.into_iter();
                match (items.next(), items.next(), items.next()) {
                    (Some(a), Some(b), None) => Ok((A::from_stored(a)?, B::from_stored(b)?)),
                    _ => Err(StorageError::Deserialization(
                        "expected a two-element list".to_owned(),
                    )),
                }
            }
            other => Err(unexpected("pair", &other)),
        }
    }
}

impl<V: StorageValue> StorageValue for BTreeMap<String, V> {
    fn to_stored(&self) -> StoredValue {
        StoredValue::Map(
            self.iter()
                .map(|(key, value)| (StoredValue::String(key.clone()), value.to_stored()))
                .collect(),
        )
    }

    fn from_stored(value: StoredValue) -> Result<Self, StorageError> {
        match value {
            StoredValue::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| {
                    let key = match key {
                        StoredValue::String(key) => key,
                        other => return Err(unexpected("string key", &other)),
                    };
                    Ok((key, V::from_stored(value)?))
                })
                .collect(),
            other => Err(unexpected("map", &other)),
        }
    }
}
