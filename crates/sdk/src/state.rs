//! Root state persistence.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::env;

/// The well-known storage key the root state object lives under.
pub const STATE_KEY: &[u8] = b"__meld::root";

/// Whether the context has been initialized.
#[must_use]
pub fn exists() -> bool {
    env::storage_read(STATE_KEY).is_some()
}

/// Loads the root state object.
pub fn load<S: BorshDeserialize>() -> Result<Option<S>, borsh::io::Error> {
    env::storage_read(STATE_KEY)
        .map(|bytes| borsh::from_slice(&bytes))
        .transpose()
}

/// Persists the root state object.
pub fn save<S: BorshSerialize>(state: &S) {
    let bytes = borsh::to_vec(state)
        .unwrap_or_else(|_| env::panic_str("root state serialization failed"));
    let _ = env::storage_write(STATE_KEY, &bytes);
}
