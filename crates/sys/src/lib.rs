//! Raw host ABI for meld guests.
//!
//! On `wasm32` these are imports provided by the host VM. On every other
//! target the same functions are backed by a complete in-process mock
//! host (see [`mock`]), so engine code and tests run the identical call
//! paths on both sides of the boundary.
//!
//! ## Conventions
//!
//! - Byte slices cross the boundary as `(len, ptr)` pairs of `u64`.
//! - Collection and context identities are raw 32-byte buffers, passed
//!   as a bare pointer with no length.
//! - Variable-size results go through numbered *registers*: the caller
//!   names a register, the host fills it, and the guest fetches it with
//!   [`register_len`] / [`read_register`]. An absent register has length
//!   `u64::MAX`.
//! - Status codes: negative means failure (a UTF-8 diagnostic is left in
//!   the named register), zero means "nothing", positive means success
//!   (any payload is in the named register).
//! - Mutating collection calls carry the guest-sampled physical time so
//!   the host stamps entries with exactly the clock the guest records in
//!   its delta actions.
//!
//! ## Register payload framings
//!
//! A few calls return composite payloads:
//!
//! - `map_iter`: `u32 count`, then per entry `u32 key_len, key,
//!   u32 value_len, value` (all little-endian).
//! - `set_iter`: `u32 count`, then per element `u32 len, bytes`.
//! - `vector_get` / `vector_update` / `vector_pop`: the element's `u64`
//!   raw index followed by its bytes (the previous bytes for `update`
//!   and `pop`).
//! - `counter_increment` / `counter_value` /
//!   `counter_get_executor_count`: a `u64` little-endian total.
//! - `lww_timestamp`: `u64 time` followed by the 16-byte node id.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        extern "C" {
            // ============================================================
            // Registers
            // ============================================================
            pub fn register_len(register_id: u64) -> u64;
            pub fn read_register(register_id: u64, ptr: u64);

            // ============================================================
            // Identity and time
            // ============================================================
            pub fn context_id(register_id: u64);
            pub fn executor_id(register_id: u64);
            pub fn time_now() -> u64;

            // ============================================================
            // Invocation I/O
            // ============================================================
            pub fn input(register_id: u64);
            pub fn value_return(value_len: u64, value_ptr: u64);
            pub fn panic_utf8(len: u64, ptr: u64) -> !;
            pub fn log_utf8(len: u64, ptr: u64);
            pub fn emit(kind_len: u64, kind_ptr: u64, payload_len: u64, payload_ptr: u64);

            // ============================================================
            // Raw storage
            // ============================================================
            pub fn storage_read(key_len: u64, key_ptr: u64, register_id: u64) -> i32;
            pub fn storage_write(
                key_len: u64,
                key_ptr: u64,
                value_len: u64,
                value_ptr: u64,
                register_id: u64,
            ) -> i32;
            pub fn storage_remove(key_len: u64, key_ptr: u64, register_id: u64) -> i32;

            // ============================================================
            // Commit and blobs
            // ============================================================
            pub fn commit(
                root_hash_ptr: u64,
                artifact_len: u64,
                artifact_ptr: u64,
                register_id: u64,
            ) -> i32;
            pub fn blob_announce_to_context(
                blob_id_ptr: u64,
                context_id_ptr: u64,
                register_id: u64,
            ) -> i32;

            // ============================================================
            // Map (also backs user storage and frozen storage)
            // ============================================================
            pub fn map_new(register_id: u64) -> i32;
            pub fn map_insert(
                map_id_ptr: u64,
                key_len: u64,
                key_ptr: u64,
                value_len: u64,
                value_ptr: u64,
                time: u64,
                register_id: u64,
            ) -> i32;
            pub fn map_get(map_id_ptr: u64, key_len: u64, key_ptr: u64, register_id: u64) -> i32;
            pub fn map_remove(
                map_id_ptr: u64,
                key_len: u64,
                key_ptr: u64,
                time: u64,
                register_id: u64,
            ) -> i32;
            pub fn map_contains(
                map_id_ptr: u64,
                key_len: u64,
                key_ptr: u64,
                register_id: u64,
            ) -> i32;
            pub fn map_iter(map_id_ptr: u64, register_id: u64) -> i32;
            pub fn map_len(map_id_ptr: u64, register_id: u64) -> i64;
            pub fn map_clear(map_id_ptr: u64, time: u64, register_id: u64) -> i32;

            // ============================================================
            // Set
            // ============================================================
            pub fn set_new(register_id: u64) -> i32;
            pub fn set_insert(
                set_id_ptr: u64,
                value_len: u64,
                value_ptr: u64,
                time: u64,
                register_id: u64,
            ) -> i32;
            pub fn set_contains(
                set_id_ptr: u64,
                value_len: u64,
                value_ptr: u64,
                register_id: u64,
            ) -> i32;
            pub fn set_remove(
                set_id_ptr: u64,
                value_len: u64,
                value_ptr: u64,
                time: u64,
                register_id: u64,
            ) -> i32;
            pub fn set_len(set_id_ptr: u64, register_id: u64) -> i64;
            pub fn set_iter(set_id_ptr: u64, register_id: u64) -> i32;
            pub fn set_clear(set_id_ptr: u64, time: u64, register_id: u64) -> i32;

            // ============================================================
            // Vector
            // ============================================================
            pub fn vector_new(register_id: u64) -> i32;
            pub fn vector_len(vector_id_ptr: u64, register_id: u64) -> i64;
            pub fn vector_push(
                vector_id_ptr: u64,
                value_len: u64,
                value_ptr: u64,
                time: u64,
                register_id: u64,
            ) -> i64;
            pub fn vector_get(vector_id_ptr: u64, index: u64, register_id: u64) -> i32;
            pub fn vector_update(
                vector_id_ptr: u64,
                index: u64,
                value_len: u64,
                value_ptr: u64,
                time: u64,
                register_id: u64,
            ) -> i32;
            pub fn vector_pop(vector_id_ptr: u64, time: u64, register_id: u64) -> i32;
            pub fn vector_clear(vector_id_ptr: u64, time: u64, register_id: u64) -> i32;

            // ============================================================
            // LWW register
            // ============================================================
            pub fn lww_new(register_id: u64) -> i32;
            pub fn lww_set(
                lww_id_ptr: u64,
                value_len: u64,
                value_ptr: u64,
                time: u64,
                register_id: u64,
            ) -> i32;
            pub fn lww_get(lww_id_ptr: u64, register_id: u64) -> i32;
            pub fn lww_timestamp(lww_id_ptr: u64, register_id: u64) -> i32;

            // ============================================================
            // Counter
            // ============================================================
            pub fn counter_new(register_id: u64) -> i32;
            pub fn counter_increment(
                counter_id_ptr: u64,
                amount: u64,
                positive: u32,
                time: u64,
                register_id: u64,
            ) -> i32;
            pub fn counter_value(counter_id_ptr: u64, register_id: u64) -> i32;
            pub fn counter_get_executor_count(
                counter_id_ptr: u64,
                executor_id_ptr: u64,
                register_id: u64,
            ) -> i32;
        }
    } else {
        pub mod mock;

        pub use mock::ffi::*;
    }
}
