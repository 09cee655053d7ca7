//! The delta recorder.
//!
//! Collections report every mutation here as an [`Action`]; the
//! dispatcher seals the buffer at the end of a mutating invocation by
//! calling [`commit`], which serializes the artifact, computes its root
//! hash, and hands both to the host. View invocations call [`abort`]
//! instead and the buffer is discarded.
//!
//! The recorder also owns the nested-collection graph: when a stored
//! value carrying collection references is written or read, an edge from
//! each referenced child to the enclosing entry is recorded. A mutation
//! of the child marks it dirty, and [`commit`] walks the edges upward,
//! re-emitting each enclosing entry so replicas that merge the delta see
//! the outer value refreshed along with the inner change. Action and
//! dirty state are invocation-scoped; the edge graph lives as long as
//! the VM instance, and is rebuilt from values as they are rehydrated
//! after a cold start.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use meld_primitives::action::{encode_artifact, root_hash, Action, EntryRecord};
use meld_primitives::crdt::CrdtKind;
use meld_primitives::hlc::Hlc;
use meld_primitives::id::CollectionId;
use meld_primitives::value::CollectionRef;

use crate::env;

/// The entry a nested collection lives inside.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParentEntry {
    pub collection: CollectionId,
    pub crdt: CrdtKind,
    pub key: Vec<u8>,
}

#[derive(Debug, Default)]
struct Recorder {
    actions: Vec<Action>,
    dirty: BTreeSet<CollectionId>,
    parents: HashMap<CollectionId, ParentEntry>,
}

thread_local! {
    static RECORDER: RefCell<Recorder> = RefCell::new(Recorder::default());
}

fn with<R>(f: impl FnOnce(&mut Recorder) -> R) -> R {
    RECORDER.with(|recorder| f(&mut recorder.borrow_mut()))
}

/// Begins a fresh recording for a new invocation.
pub fn start() {
    with(|recorder| {
        recorder.actions.clear();
        recorder.dirty.clear();
    });
}

/// Discards the current invocation's buffer without committing.
pub fn abort() {
    start();
}

/// Appends a mutation to the current invocation's buffer.
pub fn push_action(action: Action) {
    with(|recorder| recorder.actions.push(action));
}

/// Number of actions buffered so far.
#[must_use]
pub fn action_count() -> usize {
    with(|recorder| recorder.actions.len())
}

/// Marks a collection as mutated in this invocation.
pub fn touch(collection: CollectionId) {
    with(|recorder| {
        let _ = recorder.dirty.insert(collection);
    });
}

/// Records that `children` live inside `parent`'s entry.
pub fn register_children(parent: &ParentEntry, children: &[CollectionRef]) {
    if children.is_empty() {
        return;
    }
    with(|recorder| {
        for child in children {
            let _ = recorder.parents.insert(child.id, parent.clone());
        }
    });
}

/// Drops all recorder state, including the nested-collection graph.
/// Test plumbing for simulating a fresh VM instance.
pub fn reset() {
    with(|recorder| *recorder = Recorder::default());
}

/// Seals the buffer: re-emits entries that enclose dirtied collections,
/// serializes the artifact, and commits it under its root hash.
///
/// Returns the root hash, or `None` when nothing was recorded — an
/// invocation that mutated nothing commits nothing.
pub fn commit() -> Result<Option<[u8; 32]>, env::HostError> {
    let (dirty, parents) = with(|recorder| {
        (
            core::mem::take(&mut recorder.dirty),
            recorder.parents.clone(),
        )
    });

    let reemitted = reemit_enclosing_entries(dirty, &parents)?;
    let actions = with(|recorder| {
        recorder.actions.extend(reemitted);
        core::mem::take(&mut recorder.actions)
    });

    if actions.is_empty() {
        return Ok(None);
    }

    let artifact = encode_artifact(&actions);
    let hash = root_hash(&artifact);
    env::commit(hash, &artifact)?;
    Ok(Some(hash))
}

/// Walks dirty collections up through the edge graph, producing an
/// `Update` for every enclosing entry. The walk is transitive: a
/// re-emitted entry dirties its own collection in turn.
fn reemit_enclosing_entries(
    dirty: BTreeSet<CollectionId>,
    parents: &HashMap<CollectionId, ParentEntry>,
) -> Result<Vec<Action>, env::HostError> {
    if dirty.is_empty() {
        return Ok(Vec::new());
    }
    let mut queue: Vec<CollectionId> = dirty.into_iter().collect();
    let mut visited = BTreeSet::new();
    let mut actions = Vec::new();
    let executor = env::executor_id();

    while let Some(child) = queue.pop() {
        if !visited.insert(child) {
            continue;
        }
        let Some(parent) = parents.get(&child) else {
            continue;
        };
        let Some(value) = read_entry(parent)? else {
            // The enclosing entry was removed or replaced; there is
            // nothing to refresh.
            continue;
        };
        let time = env::time_now();
        let record = EntryRecord {
            collection: parent.collection,
            crdt: parent.crdt,
            key: parent.key.clone(),
            value,
            hlc: Hlc::of(time, &executor),
        };
        let data =
            borsh::to_vec(&record).unwrap_or_else(|_| env::panic_str("entry record serialization"));
        actions.push(Action::Update {
            id: record.entry_id(),
            time,
            data,
        });
        queue.push(parent.collection);
    }

    Ok(actions)
}

/// Reads the current value bytes of the entry a parent edge points at.
fn read_entry(parent: &ParentEntry) -> Result<Option<Vec<u8>>, env::HostError> {
    match parent.crdt {
        CrdtKind::Map | CrdtKind::UserStorage | CrdtKind::FrozenStorage => {
            env::map_get(&parent.collection, &parent.key)
        }
        CrdtKind::LwwRegister => env::lww_get(&parent.collection),
        CrdtKind::Vector => {
            let target = meld_primitives::store::parse_vector_key(&parent.key)
                .map_err(|err| env::HostError(err.to_string()))?;
            let len = env::vector_len(&parent.collection)?;
            for position in 0..len {
                if let Some((raw, value)) = env::vector_get(&parent.collection, position)? {
                    if raw == target {
                        return Ok(Some(value));
                    }
                }
            }
            Ok(None)
        }
        // Set elements and counter buckets cannot carry nested
        // collections.
        CrdtKind::Set | CrdtKind::Counter => Ok(None),
    }
}
