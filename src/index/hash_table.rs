use std::hash::Hash;

use crate::errors::IndexError;

/// Key/value table used as a buffer pool's page table.
///
/// Implementations are shared across threads, so every operation takes
/// `&self` and returns owned values.
pub trait HashTable<K: Hash + Eq, V: Clone>: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Fails only when the table cannot grow any further.
    fn insert(&self, key: K, value: V) -> Result<(), IndexError>;

    fn find(&self, key: &K) -> Option<V>;

    /// Returns `false` when `key` was not present.
    fn remove(&self, key: &K) -> bool;
}
