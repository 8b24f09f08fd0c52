use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hashlink::LinkedHashMap;
use tracing::trace;

/// Eviction policy over frame identifiers.
///
/// Every method takes `&self`: implementations are shared between the worker
/// threads of a buffer pool and synchronise internally.
pub trait Replacer<ID: Eq + Hash + Copy>: Send + Sync {
    /// Marks `entry_id` as the most recently used entry, tracking it if needed.
    fn insert(&self, entry_id: ID);

    /// Removes and returns the least recently used entry.
    fn victim(&self) -> Option<ID>;

    /// Stops tracking `entry_id`. Returns whether it was tracked.
    fn erase(&self, entry_id: ID) -> bool;

    fn size(&self) -> usize;
}

/// Least-recently-used replacer.
///
/// The linked map keeps insertion order and an id -> node index in one
/// structure: the front is the LRU end, the back is the MRU end.
pub struct LRUReplacer<ID: Eq + Hash + Copy> {
    node_store: Mutex<LinkedHashMap<ID, ()>>,
}

impl<ID: Eq + Hash + Copy> LRUReplacer<ID> {
    pub fn new() -> Self {
        LRUReplacer {
            node_store: Mutex::new(LinkedHashMap::new()),
        }
    }

    /// Pre-allocates room for `number_of_entries` ids, typically the number of
    /// frames in the pool.
    pub fn with_capacity(number_of_entries: usize) -> Self {
        LRUReplacer {
            node_store: Mutex::new(LinkedHashMap::with_capacity(number_of_entries)),
        }
    }

    pub fn contains(&self, entry_id: ID) -> bool {
        self.store().contains_key(&entry_id)
    }

    // Nothing in here can panic half-way through a list update, so a poisoned
    // lock still guards a consistent map.
    fn store(&self) -> MutexGuard<'_, LinkedHashMap<ID, ()>> {
        self.node_store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<ID: Eq + Hash + Copy> Default for LRUReplacer<ID> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ID: Eq + Hash + Copy + Send> Replacer<ID> for LRUReplacer<ID> {
    fn insert(&self, entry_id: ID) {
        let mut store = self.store();

        // Re-inserting moves the entry to the MRU end
        store.remove(&entry_id);
        store.insert(entry_id, ());
    }

    fn victim(&self) -> Option<ID> {
        let mut store = self.store();
        let (entry_id, _) = store.pop_front()?;
        trace!(remaining = store.len(), "selected eviction victim");
        Some(entry_id)
    }

    fn erase(&self, entry_id: ID) -> bool {
        let erased = self.store().remove(&entry_id).is_some();
        if erased {
            trace!("erased entry from replacer");
        }
        erased
    }

    fn size(&self) -> usize {
        self.store().len()
    }
}
