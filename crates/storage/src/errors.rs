use meld_primitives::id::ParseIdError;
use meld_primitives::value::StoredValueError;
use meld_sdk::env::HostError;
use thiserror::Error;

/// A failure inside a collection operation.
///
/// All of these abort the invocation at the dispatcher boundary; code
/// that wants to attempt an operation fallibly validates its
/// preconditions first (for example, checking `len` before `get`).
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum StorageError {
    /// A provided collection id is not 32 bytes or not lowercase hex.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] ParseIdError),
    /// A vector access past the end.
    #[error("index {index} is out of bounds")]
    OutOfBounds { index: u64 },
    /// A counter amount that cannot be applied.
    #[error("counter amount is invalid")]
    InvalidAmount,
    /// An attempt to remove from or replace in frozen storage.
    #[error("frozen storage entries cannot be removed or replaced")]
    FrozenViolation,
    /// A negative-status host result, with the host's diagnostic.
    #[error(transparent)]
    Host(#[from] HostError),
    /// Malformed stored bytes.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl From<StoredValueError> for StorageError {
    fn from(err: StoredValueError) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<borsh::io::Error> for StorageError {
    fn from(err: borsh::io::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}
