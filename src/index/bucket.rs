use std::collections::{hash_map, HashMap};
use std::hash::Hash;

/// Fixed-capacity bucket addressed by one or more directory slots.
///
/// The bucket does not know which slots point at it. Capacity is enforced by
/// the table, which owns the configured bucket size.
#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    items: HashMap<K, V>,
    local_depth: usize,
}

impl<K: Hash + Eq, V> Bucket<K, V> {
    pub(crate) fn new(local_depth: usize) -> Self {
        Bucket {
            items: HashMap::new(),
            local_depth,
        }
    }

    pub(crate) fn local_depth(&self) -> usize {
        self.local_depth
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        self.items.get(key)
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    /// True when `key` can be stored without splitting: either it is already
    /// present (overwrite) or there is room for one more entry.
    pub(crate) fn accepts(&self, key: &K, bucket_size: usize) -> bool {
        self.items.len() < bucket_size || self.items.contains_key(key)
    }

    pub(crate) fn keys(&self) -> hash_map::Keys<'_, K, V> {
        self.items.keys()
    }

    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.items.insert(key, value)
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        self.items.remove(key)
    }

    /// Empties the bucket, handing its entries over for redistribution.
    pub(crate) fn drain(&mut self) -> hash_map::Drain<'_, K, V> {
        self.items.drain()
    }
}
