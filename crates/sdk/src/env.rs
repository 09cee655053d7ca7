//! Typed bridge over the raw host ABI.
//!
//! Every function here wraps exactly one host call and translates the
//! status protocol: negative statuses become a [`HostError`] carrying the
//! host's diagnostic, zero becomes `None`/`false`, positive carries the
//! register payload. Failures that leave the guest without a usable
//! environment (an unreadable register, a failed collection creation)
//! abort the invocation through [`panic_str`].

use meld_primitives::hlc::Hlc;
use meld_primitives::id::{BlobId, CollectionId, ContextId, ExecutorId};
use meld_sys as sys;
use thiserror::Error;

/// The scratch register used for all variable-size host results.
///
/// Invocations are single-threaded and every wrapper drains the register
/// before returning, so one register is enough.
pub const DATA_REGISTER: u64 = 0;

/// A negative-status result from a host operation, carrying the host's
/// diagnostic string.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("host error: {0}")]
pub struct HostError(pub String);

// ============================================================
// Registers
// ============================================================

/// Reads a register, or `None` when the host has not filled it.
#[must_use]
pub fn read_register(register_id: u64) -> Option<Vec<u8>> {
    let len = unsafe { sys::register_len(register_id) };
    if len == u64::MAX {
        return None;
    }
    let mut buf = vec![0; usize::try_from(len).unwrap_or_else(|_| panic_str("register too large"))];
    unsafe { sys::read_register(register_id, buf.as_mut_ptr() as u64) };
    Some(buf)
}

fn expect_register(register_id: u64) -> Vec<u8> {
    read_register(register_id).unwrap_or_else(|| panic_str("host did not fill the register"))
}

fn host_error(register_id: u64) -> HostError {
    let message = read_register(register_id)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|| "host failure without diagnostic".to_owned());
    HostError(message)
}

/// Decodes a tri-state status: `Err` on negative, `None` on zero, the
/// register payload on positive.
fn status_payload(status: i32, register_id: u64) -> Result<Option<Vec<u8>>, HostError> {
    if status < 0 {
        Err(host_error(register_id))
    } else if status == 0 {
        Ok(None)
    } else {
        Ok(Some(expect_register(register_id)))
    }
}

fn status_flag(status: i32, register_id: u64) -> Result<bool, HostError> {
    if status < 0 {
        Err(host_error(register_id))
    } else {
        Ok(status > 0)
    }
}

fn status_unit(status: i32, register_id: u64) -> Result<(), HostError> {
    if status < 0 {
        Err(host_error(register_id))
    } else {
        Ok(())
    }
}

fn status_len(value: i64, register_id: u64) -> Result<u64, HostError> {
    if value < 0 {
        Err(host_error(register_id))
    } else {
        Ok(value as u64)
    }
}

fn ptr_of(bytes: &[u8]) -> u64 {
    bytes.as_ptr() as u64
}

fn len_of(bytes: &[u8]) -> u64 {
    bytes.len() as u64
}

// ============================================================
// Identity and time
// ============================================================

#[must_use]
pub fn context_id() -> ContextId {
    unsafe { sys::context_id(DATA_REGISTER) };
    ContextId::from_slice(&expect_register(DATA_REGISTER))
        .unwrap_or_else(|_| panic_str("host returned a malformed context id"))
}

#[must_use]
pub fn executor_id() -> ExecutorId {
    unsafe { sys::executor_id(DATA_REGISTER) };
    ExecutorId::from_slice(&expect_register(DATA_REGISTER))
        .unwrap_or_else(|_| panic_str("host returned a malformed executor id"))
}

/// Host physical time. Monotonically non-decreasing within one replica.
#[must_use]
pub fn time_now() -> u64 {
    unsafe { sys::time_now() }
}

/// Samples the hybrid logical clock: host time stamped with the current
/// executor's node prefix.
#[must_use]
pub fn hlc_now() -> Hlc {
    Hlc::of(time_now(), &executor_id())
}

// ============================================================
// Invocation I/O
// ============================================================

/// The current invocation's argument bytes.
#[must_use]
pub fn input() -> Vec<u8> {
    unsafe { sys::input(DATA_REGISTER) };
    read_register(DATA_REGISTER).unwrap_or_default()
}

pub fn value_return(value: &[u8]) {
    unsafe { sys::value_return(len_of(value), ptr_of(value)) };
}

/// Aborts the invocation irrecoverably with a diagnostic.
pub fn panic_str(message: &str) -> ! {
    unsafe { sys::panic_utf8(len_of(message.as_bytes()), ptr_of(message.as_bytes())) }
}

/// Writes a line to the host's debug log.
pub fn log(message: &str) {
    unsafe { sys::log_utf8(len_of(message.as_bytes()), ptr_of(message.as_bytes())) };
}

/// Formats and writes a line to the host's debug log.
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::env::log(&::std::format!($($arg)*))
    };
}

/// Surfaces an application event to the host.
pub fn emit_raw(kind: &str, payload: &[u8]) {
    unsafe {
        sys::emit(
            len_of(kind.as_bytes()),
            ptr_of(kind.as_bytes()),
            len_of(payload),
            ptr_of(payload),
        );
    }
}

/// Submits a delta artifact under its root hash.
pub fn commit(root_hash: [u8; 32], artifact: &[u8]) -> Result<(), HostError> {
    let status = unsafe {
        sys::commit(
            root_hash.as_ptr() as u64,
            len_of(artifact),
            ptr_of(artifact),
            DATA_REGISTER,
        )
    };
    status_unit(status, DATA_REGISTER)
}

/// Announces an out-of-band blob to a context.
pub fn blob_announce_to_context(blob: BlobId, context: ContextId) -> Result<bool, HostError> {
    let status = unsafe {
        sys::blob_announce_to_context(
            blob.as_bytes().as_ptr() as u64,
            context.as_bytes().as_ptr() as u64,
            DATA_REGISTER,
        )
    };
    status_flag(status, DATA_REGISTER)
}

// ============================================================
// Raw storage
// ============================================================

#[must_use]
pub fn storage_read(key: &[u8]) -> Option<Vec<u8>> {
    let status = unsafe { sys::storage_read(len_of(key), ptr_of(key), DATA_REGISTER) };
    status_payload(status, DATA_REGISTER)
        .unwrap_or_else(|err| panic_str(&format!("storage read failed: {err}")))
}

/// Returns whether an existing value was replaced.
pub fn storage_write(key: &[u8], value: &[u8]) -> bool {
    let status = unsafe {
        sys::storage_write(len_of(key), ptr_of(key), len_of(value), ptr_of(value), DATA_REGISTER)
    };
    status_flag(status, DATA_REGISTER)
        .unwrap_or_else(|err| panic_str(&format!("storage write failed: {err}")))
}

/// Returns whether a value was present.
pub fn storage_remove(key: &[u8]) -> bool {
    let status = unsafe { sys::storage_remove(len_of(key), ptr_of(key), DATA_REGISTER) };
    status_flag(status, DATA_REGISTER)
        .unwrap_or_else(|err| panic_str(&format!("storage remove failed: {err}")))
}

// ============================================================
// Collections
// ============================================================

fn id_ptr(id: &CollectionId) -> u64 {
    id.as_bytes().as_ptr() as u64
}

fn fresh_collection(status: i32, what: &str) -> CollectionId {
    let bytes = status_payload(status, DATA_REGISTER)
        .unwrap_or_else(|err| panic_str(&format!("failed to create {what}: {err}")))
        .unwrap_or_else(|| panic_str(&format!("host returned no id for new {what}")));
    CollectionId::from_slice(&bytes)
        .unwrap_or_else(|_| panic_str(&format!("host returned a malformed id for new {what}")))
}

// ---- map (also user storage and frozen storage) ----

#[must_use]
pub fn map_new() -> CollectionId {
    let status = unsafe { sys::map_new(DATA_REGISTER) };
    fresh_collection(status, "map")
}

pub fn map_insert(
    id: &CollectionId,
    key: &[u8],
    value: &[u8],
    time: u64,
) -> Result<Option<Vec<u8>>, HostError> {
    let status = unsafe {
        sys::map_insert(
            id_ptr(id),
            len_of(key),
            ptr_of(key),
            len_of(value),
            ptr_of(value),
            time,
            DATA_REGISTER,
        )
    };
    status_payload(status, DATA_REGISTER)
}

pub fn map_get(id: &CollectionId, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
    let status = unsafe { sys::map_get(id_ptr(id), len_of(key), ptr_of(key), DATA_REGISTER) };
    status_payload(status, DATA_REGISTER)
}

pub fn map_remove(id: &CollectionId, key: &[u8], time: u64) -> Result<Option<Vec<u8>>, HostError> {
    let status =
        unsafe { sys::map_remove(id_ptr(id), len_of(key), ptr_of(key), time, DATA_REGISTER) };
    status_payload(status, DATA_REGISTER)
}

pub fn map_contains(id: &CollectionId, key: &[u8]) -> Result<bool, HostError> {
    let status = unsafe { sys::map_contains(id_ptr(id), len_of(key), ptr_of(key), DATA_REGISTER) };
    status_flag(status, DATA_REGISTER)
}

/// Materializes the map's live entries as a snapshot.
pub fn map_iter(id: &CollectionId) -> Result<Vec<(Vec<u8>, Vec<u8>)>, HostError> {
    let status = unsafe { sys::map_iter(id_ptr(id), DATA_REGISTER) };
    let payload = status_payload(status, DATA_REGISTER)?
        .ok_or_else(|| HostError("host returned no iterator payload".to_owned()))?;
    let mut reader = payload.as_slice();
    let count = read_u32(&mut reader)?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let key = read_frame(&mut reader)?;
        let value = read_frame(&mut reader)?;
        entries.push((key, value));
    }
    Ok(entries)
}

pub fn map_len(id: &CollectionId) -> Result<u64, HostError> {
    let value = unsafe { sys::map_len(id_ptr(id), DATA_REGISTER) };
    status_len(value, DATA_REGISTER)
}

pub fn map_clear(id: &CollectionId, time: u64) -> Result<(), HostError> {
    let status = unsafe { sys::map_clear(id_ptr(id), time, DATA_REGISTER) };
    status_unit(status, DATA_REGISTER)
}

// ---- set ----

#[must_use]
pub fn set_new() -> CollectionId {
    let status = unsafe { sys::set_new(DATA_REGISTER) };
    fresh_collection(status, "set")
}

/// Returns whether the element was newly inserted.
pub fn set_insert(id: &CollectionId, element: &[u8], time: u64) -> Result<bool, HostError> {
    let status = unsafe {
        sys::set_insert(id_ptr(id), len_of(element), ptr_of(element), time, DATA_REGISTER)
    };
    status_flag(status, DATA_REGISTER)
}

pub fn set_contains(id: &CollectionId, element: &[u8]) -> Result<bool, HostError> {
    let status =
        unsafe { sys::set_contains(id_ptr(id), len_of(element), ptr_of(element), DATA_REGISTER) };
    status_flag(status, DATA_REGISTER)
}

/// Returns whether the element was previously present.
pub fn set_remove(id: &CollectionId, element: &[u8], time: u64) -> Result<bool, HostError> {
    let status = unsafe {
        sys::set_remove(id_ptr(id), len_of(element), ptr_of(element), time, DATA_REGISTER)
    };
    status_flag(status, DATA_REGISTER)
}

pub fn set_len(id: &CollectionId) -> Result<u64, HostError> {
    let value = unsafe { sys::set_len(id_ptr(id), DATA_REGISTER) };
    status_len(value, DATA_REGISTER)
}

/// Materializes the set's live elements as a snapshot.
pub fn set_iter(id: &CollectionId) -> Result<Vec<Vec<u8>>, HostError> {
    let status = unsafe { sys::set_iter(id_ptr(id), DATA_REGISTER) };
    let payload = status_payload(status, DATA_REGISTER)?
        .ok_or_else(|| HostError("host returned no iterator payload".to_owned()))?;
    let mut reader = payload.as_slice();
    let count = read_u32(&mut reader)?;
    let mut elements = Vec::new();
    for _ in 0..count {
        elements.push(read_frame(&mut reader)?);
    }
    Ok(elements)
}

pub fn set_clear(id: &CollectionId, time: u64) -> Result<(), HostError> {
    let status = unsafe { sys::set_clear(id_ptr(id), time, DATA_REGISTER) };
    status_unit(status, DATA_REGISTER)
}

// ---- vector ----

#[must_use]
pub fn vector_new() -> CollectionId {
    let status = unsafe { sys::vector_new(DATA_REGISTER) };
    fresh_collection(status, "vector")
}

pub fn vector_len(id: &CollectionId) -> Result<u64, HostError> {
    let value = unsafe { sys::vector_len(id_ptr(id), DATA_REGISTER) };
    status_len(value, DATA_REGISTER)
}

/// Appends a value. Returns the raw index it landed at.
pub fn vector_push(id: &CollectionId, value: &[u8], time: u64) -> Result<u64, HostError> {
    let index = unsafe {
        sys::vector_push(id_ptr(id), len_of(value), ptr_of(value), time, DATA_REGISTER)
    };
    status_len(index, DATA_REGISTER)
}

/// Value at live position `index`, with the raw index it lives at.
pub fn vector_get(id: &CollectionId, index: u64) -> Result<Option<(u64, Vec<u8>)>, HostError> {
    let status = unsafe { sys::vector_get(id_ptr(id), index, DATA_REGISTER) };
    status_payload(status, DATA_REGISTER)?
        .map(|payload| split_indexed(&payload))
        .transpose()
}

/// Replaces the value at live position `index`. Returns the raw index
/// and the previous value.
pub fn vector_update(
    id: &CollectionId,
    index: u64,
    value: &[u8],
    time: u64,
) -> Result<Option<(u64, Vec<u8>)>, HostError> {
    let status = unsafe {
        sys::vector_update(id_ptr(id), index, len_of(value), ptr_of(value), time, DATA_REGISTER)
    };
    status_payload(status, DATA_REGISTER)?
        .map(|payload| split_indexed(&payload))
        .transpose()
}

/// Removes the last element. Returns its raw index and value.
pub fn vector_pop(id: &CollectionId, time: u64) -> Result<Option<(u64, Vec<u8>)>, HostError> {
    let status = unsafe { sys::vector_pop(id_ptr(id), time, DATA_REGISTER) };
    status_payload(status, DATA_REGISTER)?
        .map(|payload| split_indexed(&payload))
        .transpose()
}

pub fn vector_clear(id: &CollectionId, time: u64) -> Result<(), HostError> {
    let status = unsafe { sys::vector_clear(id_ptr(id), time, DATA_REGISTER) };
    status_unit(status, DATA_REGISTER)
}

// ---- lww register ----

#[must_use]
pub fn lww_new() -> CollectionId {
    let status = unsafe { sys::lww_new(DATA_REGISTER) };
    fresh_collection(status, "lww register")
}

pub fn lww_set(id: &CollectionId, value: &[u8], time: u64) -> Result<(), HostError> {
    let status =
        unsafe { sys::lww_set(id_ptr(id), len_of(value), ptr_of(value), time, DATA_REGISTER) };
    status_unit(status, DATA_REGISTER)
}

pub fn lww_get(id: &CollectionId) -> Result<Option<Vec<u8>>, HostError> {
    let status = unsafe { sys::lww_get(id_ptr(id), DATA_REGISTER) };
    status_payload(status, DATA_REGISTER)
}

pub fn lww_timestamp(id: &CollectionId) -> Result<Option<Hlc>, HostError> {
    let status = unsafe { sys::lww_timestamp(id_ptr(id), DATA_REGISTER) };
    status_payload(status, DATA_REGISTER)?
        .map(|payload| {
            let bytes: [u8; Hlc::LENGTH] = payload
                .as_slice()
                .try_into()
                .map_err(|_| HostError("malformed timestamp payload".to_owned()))?;
            Ok(Hlc::from_bytes(&bytes))
        })
        .transpose()
}

// ---- counter ----

#[must_use]
pub fn counter_new() -> CollectionId {
    let status = unsafe { sys::counter_new(DATA_REGISTER) };
    fresh_collection(status, "counter")
}

/// Adds `amount` to the current executor's bucket of the given sign.
/// Returns the bucket's new total.
pub fn counter_increment(
    id: &CollectionId,
    amount: u64,
    positive: bool,
    time: u64,
) -> Result<u64, HostError> {
    let status = unsafe {
        sys::counter_increment(id_ptr(id), amount, u32::from(positive), time, DATA_REGISTER)
    };
    let payload = status_payload(status, DATA_REGISTER)?
        .ok_or_else(|| HostError("host returned no counter total".to_owned()))?;
    decode_u64(&payload)
}

pub fn counter_value(id: &CollectionId) -> Result<u64, HostError> {
    let status = unsafe { sys::counter_value(id_ptr(id), DATA_REGISTER) };
    let payload = status_payload(status, DATA_REGISTER)?
        .ok_or_else(|| HostError("host returned no counter value".to_owned()))?;
    decode_u64(&payload)
}

pub fn counter_executor_count(
    id: &CollectionId,
    executor: &ExecutorId,
) -> Result<u64, HostError> {
    let status = unsafe {
        sys::counter_get_executor_count(
            id_ptr(id),
            executor.as_bytes().as_ptr() as u64,
            DATA_REGISTER,
        )
    };
    let payload = status_payload(status, DATA_REGISTER)?
        .ok_or_else(|| HostError("host returned no executor count".to_owned()))?;
    decode_u64(&payload)
}

// ============================================================
// Payload parsing
// ============================================================

fn read_u32(reader: &mut &[u8]) -> Result<u32, HostError> {
    if reader.len() < 4 {
        return Err(HostError("malformed iterator payload".to_owned()));
    }
    let (bytes, rest) = reader.split_at(4);
    *reader = rest;
    let mut out = [0; 4];
    out.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(out))
}

fn read_frame(reader: &mut &[u8]) -> Result<Vec<u8>, HostError> {
    let len = read_u32(reader)? as usize;
    if reader.len() < len {
        return Err(HostError("malformed iterator payload".to_owned()));
    }
    let (bytes, rest) = reader.split_at(len);
    *reader = rest;
    Ok(bytes.to_vec())
}

fn split_indexed(payload: &[u8]) -> Result<(u64, Vec<u8>), HostError> {
    if payload.len() < 8 {
        return Err(HostError("malformed vector payload".to_owned()));
    }
    let (index_bytes, value) = payload.split_at(8);
    let mut out = [0; 8];
    out.copy_from_slice(index_bytes);
    Ok((u64::from_le_bytes(out), value.to_vec()))
}

fn decode_u64(payload: &[u8]) -> Result<u64, HostError> {
    let bytes: [u8; 8] = payload
        .try_into()
        .map_err(|_| HostError("malformed u64 payload".to_owned()))?;
    Ok(u64::from_le_bytes(bytes))
}
