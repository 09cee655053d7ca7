//! In-process mock host.
//!
//! A faithful stand-in for the host VM on native targets: registers, raw
//! storage, collection states with per-entry clocks, identity, time, and
//! commit capture all behave per the ABI contract in the crate root. The
//! host is thread-local, so every test thread is its own replica; the
//! [`snapshot`]/[`restore`] pair and [`apply_artifact`] let one test
//! drive several replicas through a full exchange of deltas.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use meld_primitives::action::{decode_artifact, root_hash, Action, ArtifactError, EntryRecord};
use meld_primitives::crdt::CrdtKind;
use meld_primitives::hlc::Hlc;
use meld_primitives::id::{BlobId, CollectionId, ContentHash, ContextId, EntryId, ExecutorId};
use meld_primitives::store::{
    ApplyError, CollectionState, CounterState, LwwState, MapState, SetState, VectorState,
    LWW_SLOT_KEY,
};

const ERROR_STATUS: i32 = -1;
const ERROR_STATUS_LEN: i64 = -1;

/// A delta the guest committed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Commit {
    pub root_hash: [u8; 32],
    pub artifact: Vec<u8>,
}

/// An event the guest emitted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Event {
    pub kind: String,
    pub payload: Vec<u8>,
}

/// Opaque copy of a replica's full host state.
#[derive(Clone, Debug)]
pub struct Snapshot(Host);

/// Failure while applying a peer artifact.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ApplyArtifactError {
    #[error("malformed artifact: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("malformed entry record in update action")]
    MalformedRecord,
    #[error("entry record does not match its action id")]
    EntryIdMismatch,
    #[error("entry could not be applied: {0}")]
    Apply(#[from] ApplyError),
}

#[derive(Clone, Debug)]
struct Host {
    registers: HashMap<u64, Vec<u8>>,
    storage: BTreeMap<Vec<u8>, Vec<u8>>,
    collections: BTreeMap<CollectionId, CollectionState>,
    entry_locations: HashMap<EntryId, (CollectionId, Vec<u8>)>,
    orphan_tombstones: HashMap<EntryId, u64>,
    time: u64,
    executor: ExecutorId,
    context: ContextId,
    input: Vec<u8>,
    returned: Option<Vec<u8>>,
    logs: Vec<String>,
    events: Vec<Event>,
    commits: Vec<Commit>,
    announcements: Vec<(BlobId, ContextId)>,
    next_collection: u64,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            registers: HashMap::new(),
            storage: BTreeMap::new(),
            collections: BTreeMap::new(),
            entry_locations: HashMap::new(),
            orphan_tombstones: HashMap::new(),
            time: 1,
            executor: ExecutorId::new([0x11; 32]),
            context: ContextId::new([0x22; 32]),
            input: Vec::new(),
            returned: None,
            logs: Vec::new(),
            events: Vec::new(),
            commits: Vec::new(),
            announcements: Vec::new(),
            next_collection: 0,
        }
    }
}

impl Host {
    fn fresh_collection_id(&mut self) -> CollectionId {
        let mut seed = Vec::with_capacity(48);
        seed.extend_from_slice(b"meld::collection");
        seed.extend_from_slice(self.context.as_bytes());
        seed.extend_from_slice(&self.next_collection.to_le_bytes());
        self.next_collection += 1;
        CollectionId::new(ContentHash::digest(&seed).into_bytes())
    }
}

thread_local! {
    static HOST: RefCell<Host> = RefCell::new(Host::default());
}

fn with_host<R>(f: impl FnOnce(&mut Host) -> R) -> R {
    HOST.with(|host| f(&mut host.borrow_mut()))
}

// ============================================================
// Test controls
// ============================================================

/// Discards the replica and starts from a fresh host.
pub fn reset() {
    with_host(|host| *host = Host::default());
}

/// Sets the value the next `time_now` call returns. Time advances by one
/// per call after that; keeping it monotonic across calls to `set_time`
/// is the test's responsibility.
pub fn set_time(time: u64) {
    with_host(|host| host.time = time);
}

pub fn set_executor_id(executor: ExecutorId) {
    with_host(|host| host.executor = executor);
}

pub fn set_context_id(context: ContextId) {
    with_host(|host| host.context = context);
}

/// Sets the argument bytes for the next invocation.
pub fn set_input(input: Vec<u8>) {
    with_host(|host| host.input = input);
}

/// Takes the value the guest returned, if any.
pub fn take_return() -> Option<Vec<u8>> {
    with_host(|host| host.returned.take())
}

pub fn take_logs() -> Vec<String> {
    with_host(|host| core::mem::take(&mut host.logs))
}

pub fn take_events() -> Vec<Event> {
    with_host(|host| core::mem::take(&mut host.events))
}

/// Takes the deltas committed so far, oldest first.
pub fn take_commits() -> Vec<Commit> {
    with_host(|host| core::mem::take(&mut host.commits))
}

pub fn take_announcements() -> Vec<(BlobId, ContextId)> {
    with_host(|host| core::mem::take(&mut host.announcements))
}

/// Copies the replica's entire state.
#[must_use]
pub fn snapshot() -> Snapshot {
    with_host(|host| Snapshot(host.clone()))
}

/// Replaces the replica's state with a previously taken snapshot.
pub fn restore(snapshot: Snapshot) {
    with_host(|host| *host = snapshot.0);
}

/// Applies a peer replica's delta artifact to this replica.
///
/// Updates merge per the collection's CRDT rules; removals tombstone the
/// addressed entry. A removal for an entry this replica has never seen is
/// parked and applied as soon as the entry's first update arrives.
pub fn apply_artifact(artifact: &[u8]) -> Result<(), ApplyArtifactError> {
    let actions = decode_artifact(artifact)?;
    with_host(|host| {
        for action in actions {
            match action {
                Action::Update { id, time: _, data } => {
                    let record: EntryRecord = borsh::from_slice(&data)
                        .map_err(|_| ApplyArtifactError::MalformedRecord)?;
                    if record.entry_id() != id {
                        return Err(ApplyArtifactError::EntryIdMismatch);
                    }
                    let state = host
                        .collections
                        .entry(record.collection)
                        .or_insert_with(|| CollectionState::empty(record.crdt));
                    state.apply_update(record.crdt, &record.key, record.value, record.hlc)?;
                    let parked = host.orphan_tombstones.remove(&id);
                    if let Some(time) = parked {
                        if let Some(state) = host.collections.get_mut(&record.collection) {
                            state.apply_delete(&record.key, time)?;
                        }
                    }
                    let _ = host
                        .entry_locations
                        .insert(id, (record.collection, record.key));
                }
                Action::DeleteRef { id, time } => {
                    if let Some((collection, key)) = host.entry_locations.get(&id).cloned() {
                        if let Some(state) = host.collections.get_mut(&collection) {
                            state.apply_delete(&key, time)?;
                        }
                    } else {
                        let parked = host.orphan_tombstones.entry(id).or_insert(time);
                        *parked = (*parked).max(time);
                    }
                }
            }
        }
        Ok(())
    })
}

// ============================================================
// Op plumbing
// ============================================================

struct OpOutput {
    status: i32,
    payload: Option<Vec<u8>>,
}

impl OpOutput {
    const fn none() -> Self {
        Self {
            status: 0,
            payload: None,
        }
    }

    const fn status(status: i32) -> Self {
        Self {
            status,
            payload: None,
        }
    }

    #[allow(clippy::missing_const_for_fn, reason = "consumes an allocation")]
    fn payload(payload: Vec<u8>) -> Self {
        Self {
            status: 1,
            payload: Some(payload),
        }
    }
}

fn op(register_id: u64, f: impl FnOnce(&mut Host) -> Result<OpOutput, String>) -> i32 {
    with_host(|host| match f(host) {
        Ok(output) => {
            if let Some(payload) = output.payload {
                let _ = host.registers.insert(register_id, payload);
            }
            output.status
        }
        Err(message) => {
            let _ = host.registers.insert(register_id, message.into_bytes());
            ERROR_STATUS
        }
    })
}

fn op_len(register_id: u64, f: impl FnOnce(&mut Host) -> Result<i64, String>) -> i64 {
    with_host(|host| match f(host) {
        Ok(value) => value,
        Err(message) => {
            let _ = host.registers.insert(register_id, message.into_bytes());
            ERROR_STATUS_LEN
        }
    })
}

macro_rules! state_accessor {
    ($name:ident, $variant:ident, $state:ty, $kind:literal) => {
        fn $name<'a>(
            host: &'a mut Host,
            id: &CollectionId,
        ) -> Result<&'a mut $state, String> {
            match host.collections.get_mut(id) {
                Some(CollectionState::$variant(state)) => Ok(state),
                Some(_) => Err(format!(concat!("collection {} is not a ", $kind), id)),
                None => Err(format!("unknown collection {}", id)),
            }
        }
    };
}

state_accessor!(map_state, Map, MapState, "map");
state_accessor!(set_state, Set, SetState, "set");
state_accessor!(vector_state, Vector, VectorState, "vector");
state_accessor!(counter_state, Counter, CounterState, "counter");
state_accessor!(lww_state, Lww, LwwState, "lww register");

/// Records where an entry id points, and applies any removal that
/// arrived from a peer before this entry existed locally.
fn register_location(host: &mut Host, collection: &CollectionId, key: &[u8]) {
    let entry = EntryId::for_entry(collection, key);
    let parked = host.orphan_tombstones.remove(&entry);
    if let Some(time) = parked {
        if let Some(state) = host.collections.get_mut(collection) {
            let _ = state.apply_delete(key, time);
        }
    }
    let _ = host
        .entry_locations
        .insert(entry, (*collection, key.to_vec()));
}

fn new_collection(register_id: u64, kind: CrdtKind) -> i32 {
    op(register_id, |host| {
        let id = host.fresh_collection_id();
        let _ = host.collections.insert(id, CollectionState::empty(kind));
        Ok(OpOutput::payload(id.as_bytes().to_vec()))
    })
}

fn encode_framed(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).expect("payload exceeds the u32 frame limit");
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
}

// ============================================================
// The ABI surface
// ============================================================

/// Functions mirroring the `wasm32` host imports, byte for byte.
#[allow(
    clippy::missing_safety_doc,
    reason = "same contract as the wasm32 imports: pointers must address valid guest memory"
)]
pub mod ffi {
    use super::*;

    unsafe fn bytes_at(ptr: u64, len: u64) -> Vec<u8> {
        if len == 0 {
            return Vec::new();
        }
        std::slice::from_raw_parts(ptr as *const u8, len as usize).to_vec()
    }

    unsafe fn id_at(ptr: u64) -> CollectionId {
        let mut id = [0; 32];
        id.copy_from_slice(std::slice::from_raw_parts(ptr as *const u8, 32));
        CollectionId::new(id)
    }

    unsafe fn array_at<const N: usize>(ptr: u64) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(std::slice::from_raw_parts(ptr as *const u8, N));
        out
    }

    // ============================================================
    // Registers
    // ============================================================

    pub unsafe fn register_len(register_id: u64) -> u64 {
        with_host(|host| {
            host.registers
                .get(&register_id)
                .map_or(u64::MAX, |bytes| bytes.len() as u64)
        })
    }

    pub unsafe fn read_register(register_id: u64, ptr: u64) {
        let bytes = with_host(|host| {
            host.registers
                .get(&register_id)
                .cloned()
                .unwrap_or_else(|| panic!("register {register_id} is empty"))
        });
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
    }

    // ============================================================
    // Identity and time
    // ============================================================

    pub unsafe fn context_id(register_id: u64) {
        with_host(|host| {
            let context = host.context.as_bytes().to_vec();
            let _ = host.registers.insert(register_id, context);
        });
    }

    pub unsafe fn executor_id(register_id: u64) {
        with_host(|host| {
            let executor = host.executor.as_bytes().to_vec();
            let _ = host.registers.insert(register_id, executor);
        });
    }

    pub unsafe fn time_now() -> u64 {
        with_host(|host| {
            let now = host.time;
            host.time += 1;
            now
        })
    }

    // ============================================================
    // Invocation I/O
    // ============================================================

    pub unsafe fn input(register_id: u64) {
        with_host(|host| {
            let input = host.input.clone();
            let _ = host.registers.insert(register_id, input);
        });
    }

    pub unsafe fn value_return(value_len: u64, value_ptr: u64) {
        let value = bytes_at(value_ptr, value_len);
        with_host(|host| host.returned = Some(value));
    }

    pub unsafe fn panic_utf8(len: u64, ptr: u64) -> ! {
        let message = String::from_utf8_lossy(&bytes_at(ptr, len)).into_owned();
        panic!("{message}");
    }

    pub unsafe fn log_utf8(len: u64, ptr: u64) {
        let line = String::from_utf8_lossy(&bytes_at(ptr, len)).into_owned();
        with_host(|host| host.logs.push(line));
    }

    pub unsafe fn emit(kind_len: u64, kind_ptr: u64, payload_len: u64, payload_ptr: u64) {
        let kind = String::from_utf8_lossy(&bytes_at(kind_ptr, kind_len)).into_owned();
        let payload = bytes_at(payload_ptr, payload_len);
        with_host(|host| host.events.push(Event { kind, payload }));
    }

    // ============================================================
    // Raw storage
    // ============================================================

    pub unsafe fn storage_read(key_len: u64, key_ptr: u64, register_id: u64) -> i32 {
        let key = bytes_at(key_ptr, key_len);
        op(register_id, |host| {
            Ok(match host.storage.get(&key) {
                Some(value) => OpOutput::payload(value.clone()),
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn storage_write(
        key_len: u64,
        key_ptr: u64,
        value_len: u64,
        value_ptr: u64,
        register_id: u64,
    ) -> i32 {
        let key = bytes_at(key_ptr, key_len);
        let value = bytes_at(value_ptr, value_len);
        op(register_id, |host| {
            let replaced = host.storage.insert(key, value).is_some();
            Ok(OpOutput::status(i32::from(replaced)))
        })
    }

    pub unsafe fn storage_remove(key_len: u64, key_ptr: u64, register_id: u64) -> i32 {
        let key = bytes_at(key_ptr, key_len);
        op(register_id, |host| {
            let removed = host.storage.remove(&key).is_some();
            Ok(OpOutput::status(i32::from(removed)))
        })
    }

    // ============================================================
    // Commit and blobs
    // ============================================================

    pub unsafe fn commit(
        root_hash_ptr: u64,
        artifact_len: u64,
        artifact_ptr: u64,
        register_id: u64,
    ) -> i32 {
        let declared: [u8; 32] = array_at(root_hash_ptr);
        let artifact = bytes_at(artifact_ptr, artifact_len);
        op(register_id, |host| {
            if root_hash(&artifact) != declared {
                return Err("commit root hash does not match artifact bytes".to_owned());
            }
            host.commits.push(Commit {
                root_hash: declared,
                artifact,
            });
            Ok(OpOutput::status(1))
        })
    }

    pub unsafe fn blob_announce_to_context(
        blob_id_ptr: u64,
        context_id_ptr: u64,
        register_id: u64,
    ) -> i32 {
        let blob = BlobId::new(array_at(blob_id_ptr));
        let context = ContextId::new(array_at(context_id_ptr));
        op(register_id, |host| {
            if context != host.context {
                return Err(format!("unknown context {context}"));
            }
            host.announcements.push((blob, context));
            Ok(OpOutput::status(1))
        })
    }

    // ============================================================
    // Map
    // ============================================================

    pub unsafe fn map_new(register_id: u64) -> i32 {
        new_collection(register_id, CrdtKind::Map)
    }

    pub unsafe fn map_insert(
        map_id_ptr: u64,
        key_len: u64,
        key_ptr: u64,
        value_len: u64,
        value_ptr: u64,
        time: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(map_id_ptr);
        let key = bytes_at(key_ptr, key_len);
        let value = bytes_at(value_ptr, value_len);
        op(register_id, |host| {
            let hlc = Hlc::of(time, &host.executor);
            let previous = map_state(host, &id)?.insert(&key, value, hlc);
            register_location(host, &id, &key);
            Ok(match previous {
                Some(previous) => OpOutput::payload(previous),
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn map_get(map_id_ptr: u64, key_len: u64, key_ptr: u64, register_id: u64) -> i32 {
        let id = id_at(map_id_ptr);
        let key = bytes_at(key_ptr, key_len);
        op(register_id, |host| {
            Ok(match map_state(host, &id)?.get(&key) {
                Some(value) => OpOutput::payload(value.to_vec()),
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn map_remove(
        map_id_ptr: u64,
        key_len: u64,
        key_ptr: u64,
        time: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(map_id_ptr);
        let key = bytes_at(key_ptr, key_len);
        op(register_id, |host| {
            Ok(match map_state(host, &id)?.remove(&key, time) {
                Some(previous) => OpOutput::payload(previous),
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn map_contains(
        map_id_ptr: u64,
        key_len: u64,
        key_ptr: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(map_id_ptr);
        let key = bytes_at(key_ptr, key_len);
        op(register_id, |host| {
            Ok(OpOutput::status(i32::from(map_state(host, &id)?.contains(&key))))
        })
    }

    pub unsafe fn map_iter(map_id_ptr: u64, register_id: u64) -> i32 {
        let id = id_at(map_id_ptr);
        op(register_id, |host| {
            let state = map_state(host, &id)?;
            let entries: Vec<_> = state.iter().collect();
            let count =
                u32::try_from(entries.len()).map_err(|_| "map is too large to iterate".to_owned())?;
            let mut out = count.to_le_bytes().to_vec();
            for (key, value) in entries {
                encode_framed(&mut out, key);
                encode_framed(&mut out, value);
            }
            Ok(OpOutput::payload(out))
        })
    }

    pub unsafe fn map_len(map_id_ptr: u64, register_id: u64) -> i64 {
        let id = id_at(map_id_ptr);
        op_len(register_id, |host| Ok(map_state(host, &id)?.len() as i64))
    }

    pub unsafe fn map_clear(map_id_ptr: u64, time: u64, register_id: u64) -> i32 {
        let id = id_at(map_id_ptr);
        op(register_id, |host| {
            map_state(host, &id)?.clear(time);
            Ok(OpOutput::status(1))
        })
    }

    // ============================================================
    // Set
    // ============================================================

    pub unsafe fn set_new(register_id: u64) -> i32 {
        new_collection(register_id, CrdtKind::Set)
    }

    pub unsafe fn set_insert(
        set_id_ptr: u64,
        value_len: u64,
        value_ptr: u64,
        time: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(set_id_ptr);
        let element = bytes_at(value_ptr, value_len);
        op(register_id, |host| {
            let hlc = Hlc::of(time, &host.executor);
            let inserted = set_state(host, &id)?.insert(&element, hlc);
            register_location(host, &id, &element);
            Ok(OpOutput::status(i32::from(inserted)))
        })
    }

    pub unsafe fn set_contains(
        set_id_ptr: u64,
        value_len: u64,
        value_ptr: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(set_id_ptr);
        let element = bytes_at(value_ptr, value_len);
        op(register_id, |host| {
            Ok(OpOutput::status(i32::from(
                set_state(host, &id)?.contains(&element),
            )))
        })
    }

    pub unsafe fn set_remove(
        set_id_ptr: u64,
        value_len: u64,
        value_ptr: u64,
        time: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(set_id_ptr);
        let element = bytes_at(value_ptr, value_len);
        op(register_id, |host| {
            let removed = set_state(host, &id)?.remove(&element, time);
            Ok(OpOutput::status(i32::from(removed)))
        })
    }

    pub unsafe fn set_len(set_id_ptr: u64, register_id: u64) -> i64 {
        let id = id_at(set_id_ptr);
        op_len(register_id, |host| Ok(set_state(host, &id)?.len() as i64))
    }

    pub unsafe fn set_iter(set_id_ptr: u64, register_id: u64) -> i32 {
        let id = id_at(set_id_ptr);
        op(register_id, |host| {
            let state = set_state(host, &id)?;
            let elements: Vec<_> = state.iter().collect();
            let count = u32::try_from(elements.len())
                .map_err(|_| "set is too large to iterate".to_owned())?;
            let mut out = count.to_le_bytes().to_vec();
            for element in elements {
                encode_framed(&mut out, element);
            }
            Ok(OpOutput::payload(out))
        })
    }

    pub unsafe fn set_clear(set_id_ptr: u64, time: u64, register_id: u64) -> i32 {
        let id = id_at(set_id_ptr);
        op(register_id, |host| {
            set_state(host, &id)?.clear(time);
            Ok(OpOutput::status(1))
        })
    }

    // ============================================================
    // Vector
    // ============================================================

    pub unsafe fn vector_new(register_id: u64) -> i32 {
        new_collection(register_id, CrdtKind::Vector)
    }

    pub unsafe fn vector_len(vector_id_ptr: u64, register_id: u64) -> i64 {
        let id = id_at(vector_id_ptr);
        op_len(register_id, |host| Ok(vector_state(host, &id)?.len() as i64))
    }

    pub unsafe fn vector_push(
        vector_id_ptr: u64,
        value_len: u64,
        value_ptr: u64,
        time: u64,
        register_id: u64,
    ) -> i64 {
        let id = id_at(vector_id_ptr);
        let value = bytes_at(value_ptr, value_len);
        op_len(register_id, |host| {
            let hlc = Hlc::of(time, &host.executor);
            let index = vector_state(host, &id)?.push(value, hlc);
            register_location(host, &id, &meld_primitives::store::vector_key(index));
            Ok(index as i64)
        })
    }

    pub unsafe fn vector_get(vector_id_ptr: u64, index: u64, register_id: u64) -> i32 {
        let id = id_at(vector_id_ptr);
        op(register_id, |host| {
            Ok(match vector_state(host, &id)?.get_with_index(index) {
                Some((raw_index, value)) => {
                    let mut out = raw_index.to_le_bytes().to_vec();
                    out.extend_from_slice(value);
                    OpOutput::payload(out)
                }
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn vector_update(
        vector_id_ptr: u64,
        index: u64,
        value_len: u64,
        value_ptr: u64,
        time: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(vector_id_ptr);
        let value = bytes_at(value_ptr, value_len);
        op(register_id, |host| {
            let hlc = Hlc::of(time, &host.executor);
            let updated = vector_state(host, &id)?.update(index, value, hlc);
            Ok(match updated {
                Some((raw_index, previous)) => {
                    let mut out = raw_index.to_le_bytes().to_vec();
                    out.extend_from_slice(&previous);
                    OpOutput::payload(out)
                }
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn vector_pop(vector_id_ptr: u64, time: u64, register_id: u64) -> i32 {
        let id = id_at(vector_id_ptr);
        op(register_id, |host| {
            Ok(match vector_state(host, &id)?.pop(time) {
                Some((raw_index, value)) => {
                    let mut out = raw_index.to_le_bytes().to_vec();
                    out.extend_from_slice(&value);
                    OpOutput::payload(out)
                }
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn vector_clear(vector_id_ptr: u64, time: u64, register_id: u64) -> i32 {
        let id = id_at(vector_id_ptr);
        op(register_id, |host| {
            vector_state(host, &id)?.clear(time);
            Ok(OpOutput::status(1))
        })
    }

    // ============================================================
    // LWW register
    // ============================================================

    pub unsafe fn lww_new(register_id: u64) -> i32 {
        new_collection(register_id, CrdtKind::LwwRegister)
    }

    pub unsafe fn lww_set(
        lww_id_ptr: u64,
        value_len: u64,
        value_ptr: u64,
        time: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(lww_id_ptr);
        let value = bytes_at(value_ptr, value_len);
        op(register_id, |host| {
            let hlc = Hlc::of(time, &host.executor);
            lww_state(host, &id)?.set(value, hlc);
            register_location(host, &id, LWW_SLOT_KEY);
            Ok(OpOutput::status(1))
        })
    }

    pub unsafe fn lww_get(lww_id_ptr: u64, register_id: u64) -> i32 {
        let id = id_at(lww_id_ptr);
        op(register_id, |host| {
            Ok(match lww_state(host, &id)?.get() {
                Some(value) => OpOutput::payload(value.to_vec()),
                None => OpOutput::none(),
            })
        })
    }

    pub unsafe fn lww_timestamp(lww_id_ptr: u64, register_id: u64) -> i32 {
        let id = id_at(lww_id_ptr);
        op(register_id, |host| {
            Ok(match lww_state(host, &id)?.timestamp() {
                Some(hlc) => OpOutput::payload(hlc.to_bytes().to_vec()),
                None => OpOutput::none(),
            })
        })
    }

    // ============================================================
    // Counter
    // ============================================================

    pub unsafe fn counter_new(register_id: u64) -> i32 {
        new_collection(register_id, CrdtKind::Counter)
    }

    pub unsafe fn counter_increment(
        counter_id_ptr: u64,
        amount: u64,
        positive: u32,
        time: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(counter_id_ptr);
        let positive = positive != 0;
        let _ = time;
        op(register_id, |host| {
            let executor = host.executor;
            let total = counter_state(host, &id)?
                .record(&executor, positive, amount)
                .ok_or_else(|| "counter bucket overflow".to_owned())?;
            register_location(
                host,
                &id,
                &meld_primitives::store::counter_key(&executor, positive),
            );
            Ok(OpOutput::payload(total.to_le_bytes().to_vec()))
        })
    }

    pub unsafe fn counter_value(counter_id_ptr: u64, register_id: u64) -> i32 {
        let id = id_at(counter_id_ptr);
        op(register_id, |host| {
            let value = counter_state(host, &id)?.value();
            Ok(OpOutput::payload(value.to_le_bytes().to_vec()))
        })
    }

    pub unsafe fn counter_get_executor_count(
        counter_id_ptr: u64,
        executor_id_ptr: u64,
        register_id: u64,
    ) -> i32 {
        let id = id_at(counter_id_ptr);
        let executor = ExecutorId::new(array_at(executor_id_ptr));
        op(register_id, |host| {
            let count = counter_state(host, &id)?.executor_count(&executor);
            Ok(OpOutput::payload(count.to_le_bytes().to_vec()))
        })
    }
}

#[cfg(test)]
mod tests {
    use claims::{assert_ok, assert_some};

    use super::*;

    fn fresh() {
        reset();
    }

    #[test]
    fn registers_report_absence_and_length() {
        fresh();
        unsafe {
            assert_eq!(ffi::register_len(7), u64::MAX, "untouched register is absent");
            let _ = ffi::storage_write(3, b"key".as_ptr() as u64, 5, b"value".as_ptr() as u64, 0);
            let status = ffi::storage_read(3, b"key".as_ptr() as u64, 0);
            assert_eq!(status, 1, "read hits");
            assert_eq!(ffi::register_len(0), 5, "payload length visible");

            let mut buf = vec![0; 5];
            ffi::read_register(0, buf.as_mut_ptr() as u64);
            assert_eq!(buf, b"value");
        }
    }

    #[test]
    fn time_is_strictly_increasing() {
        fresh();
        set_time(100);
        unsafe {
            assert_eq!(ffi::time_now(), 100);
            assert_eq!(ffi::time_now(), 101);
        }
    }

    #[test]
    fn unknown_collection_reports_error() {
        fresh();
        let id = [9u8; 32];
        unsafe {
            let status = ffi::map_get(id.as_ptr() as u64, 1, b"k".as_ptr() as u64, 0);
            assert_eq!(status, ERROR_STATUS, "unknown collection is a host error");
            let len = ffi::register_len(0);
            let mut buf = vec![0; len as usize];
            ffi::read_register(0, buf.as_mut_ptr() as u64);
            let message = String::from_utf8(buf).expect("diagnostic is UTF-8");
            assert!(message.contains("unknown collection"), "got: {message}");
        }
    }

    #[test]
    fn commit_rejects_wrong_root_hash() {
        fresh();
        let artifact = meld_primitives::encode_artifact(&[]);
        let bogus = [0u8; 32];
        unsafe {
            let status = ffi::commit(
                bogus.as_ptr() as u64,
                artifact.len() as u64,
                artifact.as_ptr() as u64,
                0,
            );
            assert_eq!(status, ERROR_STATUS, "hash mismatch is rejected");
        }
        assert_eq!(take_commits(), vec![], "nothing was recorded");
    }

    #[test]
    fn snapshot_restore_round_trip() {
        fresh();
        unsafe {
            let _ = ffi::storage_write(1, b"a".as_ptr() as u64, 1, b"x".as_ptr() as u64, 0);
        }
        let snapshot = snapshot();
        unsafe {
            let _ = ffi::storage_remove(1, b"a".as_ptr() as u64, 0);
            assert_eq!(ffi::storage_read(1, b"a".as_ptr() as u64, 0), 0, "gone");
        }
        restore(snapshot);
        unsafe {
            assert_eq!(ffi::storage_read(1, b"a".as_ptr() as u64, 0), 1, "back");
        }
    }

    #[test]
    fn orphan_tombstone_applies_on_late_update() {
        fresh();

        let collection = CollectionId::new([1; 32]);
        let record = EntryRecord {
            collection,
            crdt: CrdtKind::Map,
            key: b"k".to_vec(),
            value: meld_primitives::StoredValue::U64(1).to_vec(),
            hlc: Hlc::new(5, [1; 16]),
        };
        let entry = record.entry_id();

        // The removal arrives first, addressed at an entry this replica
        // has never seen.
        let delete = meld_primitives::encode_artifact(&[Action::DeleteRef {
            id: entry,
            time: 10,
        }]);
        assert_ok!(apply_artifact(&delete));

        // The original (older) write arrives afterwards and must stay
        // suppressed.
        let update = meld_primitives::encode_artifact(&[Action::Update {
            id: entry,
            time: 5,
            data: borsh::to_vec(&record).expect("record serializes"),
        }]);
        assert_ok!(apply_artifact(&update));

        let suppressed = with_host(|host| {
            let state = assert_some!(host.collections.get(&collection)).clone();
            match state {
                CollectionState::Map(map) => map.get(b"k").is_none(),
                _ => false,
            }
        });
        assert!(suppressed, "tombstone must outlive its late entry");
    }
}
