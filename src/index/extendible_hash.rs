use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{BuildHasher, BuildHasherDefault, Hash},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use anyhow::Context;
use tracing::{debug, warn};

use crate::{config::IndexOptions, errors::IndexError};

use super::{
    bucket::Bucket,
    hash_table::HashTable,
    snapshot::{DirectorySnapshot, SlotInfo},
};

/// SipHash with fixed keys: bucket placement is the same on every run.
pub type DefaultHashBuilder = BuildHasherDefault<DefaultHasher>;

type SharedBucket<K, V> = Arc<RwLock<Bucket<K, V>>>;

struct Directory<K, V> {
    global_depth: usize,
    num_buckets: usize,
    // Always 2^global_depth slots. Several slots may alias one bucket.
    slots: Vec<SharedBucket<K, V>>,
}

impl<K: Hash + Eq, V> Directory<K, V> {
    fn new() -> Self {
        Directory {
            global_depth: 0,
            num_buckets: 1,
            slots: vec![Arc::new(RwLock::new(Bucket::new(0)))],
        }
    }

    fn slot_of(&self, hash: u64) -> usize {
        (hash & low_bits(self.global_depth)) as usize
    }

    fn bucket(&self, hash: u64) -> &SharedBucket<K, V> {
        &self.slots[self.slot_of(hash)]
    }

    // Slot i + old_len aliases slot i
    fn grow(&mut self) {
        self.slots.extend_from_within(..);
        self.global_depth += 1;
    }
}

fn low_bits(depth: usize) -> u64 {
    (1u64 << depth) - 1
}

// Slots are rewired only after a split has finished redistributing, so a
// poisoned lock still guards a directory that satisfies its invariants.
fn read_bucket<K, V>(bucket: &SharedBucket<K, V>) -> RwLockReadGuard<'_, Bucket<K, V>> {
    bucket.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_bucket<K, V>(bucket: &SharedBucket<K, V>) -> RwLockWriteGuard<'_, Bucket<K, V>> {
    bucket.write().unwrap_or_else(PoisonError::into_inner)
}

/// Extendible hash table used as the buffer pool's page table.
///
/// A directory of `2^global_depth` slots points at fixed-capacity buckets.
/// When a bucket overflows only that bucket is split; the directory doubles
/// when the overflowing bucket is addressed by a single slot. Nothing is ever
/// rehashed wholesale and the directory never shrinks.
///
/// # Locking
///
/// The directory sits behind a `RwLock` and every bucket behind its own.
/// Locks are always taken directory first, bucket second.
///
/// - `find` holds both read locks, so lookups run in parallel.
/// - `remove` and inserts into a bucket with room hold the directory read
///   lock and the bucket write lock.
/// - A split holds the directory write lock together with the overflowing
///   bucket's write lock until every slot has been rewired.
pub struct ExtendibleHash<K, V, S = DefaultHashBuilder> {
    directory: RwLock<Directory<K, V>>,
    bucket_size: usize,
    max_global_depth: usize,
    len: AtomicUsize,
    hash_builder: S,
}

impl<K: Hash + Eq, V> ExtendibleHash<K, V> {
    /// Creates a table whose buckets hold up to `bucket_size` entries.
    pub fn new(bucket_size: usize) -> Result<Self, IndexError> {
        Self::with_hasher(bucket_size, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> ExtendibleHash<K, V, S> {
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Result<Self, IndexError> {
        let options = IndexOptions {
            bucket_size,
            ..IndexOptions::default()
        };
        Self::with_options(options, hash_builder)
    }

    pub fn with_options(options: IndexOptions, hash_builder: S) -> Result<Self, IndexError> {
        if options.bucket_size == 0 {
            return Err(IndexError::ZeroBucketSize);
        }

        let limit = usize::BITS as usize;
        if options.max_global_depth >= limit {
            return Err(IndexError::InvalidMaxDepth {
                requested: options.max_global_depth,
                limit,
            });
        }

        Ok(ExtendibleHash {
            directory: RwLock::new(Directory::new()),
            bucket_size: options.bucket_size,
            max_global_depth: options.max_global_depth,
            len: AtomicUsize::new(0),
            hash_builder,
        })
    }

    pub fn global_depth(&self) -> usize {
        self.read_directory().global_depth
    }

    /// Local depth of the bucket behind directory slot `slot`.
    pub fn local_depth(&self, slot: usize) -> Result<usize, IndexError> {
        let directory = self.read_directory();
        match directory.slots.get(slot) {
            Some(bucket) => Ok(read_bucket(bucket).local_depth()),
            None => Err(IndexError::SlotOutOfRange {
                slot,
                num_slots: directory.slots.len(),
            }),
        }
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.read_directory().num_buckets
    }

    /// Number of directory slots, always `2^global_depth`.
    pub fn num_slots(&self) -> usize {
        self.read_directory().slots.len()
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &K) -> bool {
        let hash = self.hash_key(key);
        let directory = self.read_directory();
        let found = read_bucket(directory.bucket(hash)).contains_key(key);
        found
    }

    /// Point-in-time view of every slot, taken under the directory read lock.
    pub fn snapshot(&self) -> DirectorySnapshot {
        let directory = self.read_directory();
        let mut bucket_ids: HashMap<*const RwLock<Bucket<K, V>>, usize> = HashMap::new();

        let slots = directory
            .slots
            .iter()
            .map(|bucket| {
                let next_id = bucket_ids.len();
                let bucket_id = *bucket_ids.entry(Arc::as_ptr(bucket)).or_insert(next_id);
                let bucket = read_bucket(bucket);

                SlotInfo {
                    bucket_id,
                    local_depth: bucket.local_depth(),
                    len: bucket.len(),
                }
            })
            .collect();

        DirectorySnapshot {
            global_depth: directory.global_depth,
            bucket_size: self.bucket_size,
            slots,
        }
    }

    fn hash_key(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    fn read_directory(&self) -> RwLockReadGuard<'_, Directory<K, V>> {
        self.directory.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_directory(&self) -> RwLockWriteGuard<'_, Directory<K, V>> {
        self.directory.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, bucket: &mut Bucket<K, V>, key: K, value: V) {
        if bucket.insert(key, value).is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Splits the bucket behind `slot` into two buckets one bit deeper,
    /// doubling the directory first when that bit is not addressable yet.
    /// `hash` belongs to the key waiting for room.
    ///
    /// The caller holds the directory write lock.
    fn split(
        &self,
        directory: &mut Directory<K, V>,
        slot: usize,
        hash: u64,
    ) -> Result<(), IndexError> {
        let overflowing = Arc::clone(&directory.slots[slot]);
        let mut old_bucket = write_bucket(&overflowing);
        let depth = old_bucket.local_depth();

        // No bit of the hash tells these keys apart
        if old_bucket.keys().all(|key| self.hash_key(key) == hash) {
            return Err(IndexError::HashCollision {
                hash,
                bucket_size: self.bucket_size,
            });
        }

        if depth == directory.global_depth {
            if directory.global_depth >= self.max_global_depth {
                return Err(IndexError::DirectoryFull {
                    global_depth: directory.global_depth,
                    max_global_depth: self.max_global_depth,
                });
            }

            directory.grow();
            debug!(
                global_depth = directory.global_depth,
                num_slots = directory.slots.len(),
                "doubled directory"
            );
        }

        let mut zero = Bucket::new(depth + 1);
        let mut one = Bucket::new(depth + 1);

        for (key, value) in old_bucket.drain() {
            if (self.hash_key(&key) >> depth) & 1 == 1 {
                one.insert(key, value);
            } else {
                zero.insert(key, value);
            }
        }

        debug!(
            split_bit = depth,
            zero_len = zero.len(),
            one_len = one.len(),
            "split bucket"
        );

        let zero = Arc::new(RwLock::new(zero));
        let one = Arc::new(RwLock::new(one));

        // The slots aliasing the old bucket are exactly those sharing its low
        // `depth` bits: one every 2^depth slots.
        let stride = 1usize << depth;
        let first = slot & (stride - 1);
        for index in (first..directory.slots.len()).step_by(stride) {
            directory.slots[index] = if (index >> depth) & 1 == 1 {
                Arc::clone(&one)
            } else {
                Arc::clone(&zero)
            };
        }
        directory.num_buckets += 1;

        Ok(())
    }
}

impl<K, V, S> HashTable<K, V> for ExtendibleHash<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Send + Sync,
{
    fn insert(&self, key: K, value: V) -> Result<(), IndexError> {
        let hash = self.hash_key(&key);

        {
            let directory = self.read_directory();
            let mut bucket = write_bucket(directory.bucket(hash));
            if bucket.accepts(&key, self.bucket_size) {
                self.store(&mut bucket, key, value);
                return Ok(());
            }
        }

        // The bucket is full. Another thread may split it before we get the
        // write lock, so the target is looked up again on every round.
        let mut directory = self.write_directory();
        loop {
            let slot = directory.slot_of(hash);
            {
                let mut bucket = write_bucket(&directory.slots[slot]);
                if bucket.accepts(&key, self.bucket_size) {
                    self.store(&mut bucket, key, value);
                    return Ok(());
                }
            }

            if let Err(err) = self.split(&mut directory, slot, hash) {
                warn!(%err, "page table cannot grow");
                return Err(err);
            }
        }
    }

    fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash_key(key);
        let directory = self.read_directory();
        let bucket = read_bucket(directory.bucket(hash));
        bucket.get(key).cloned()
    }

    fn remove(&self, key: &K) -> bool {
        let hash = self.hash_key(key);
        let directory = self.read_directory();
        let removed = write_bucket(directory.bucket(hash)).remove(key).is_some();

        if removed {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }
}

pub struct ExtendibleHashBuilder<S = DefaultHashBuilder> {
    options: IndexOptions,
    hash_builder: S,
}

impl ExtendibleHashBuilder {
    pub fn new() -> ExtendibleHashBuilder {
        ExtendibleHashBuilder {
            options: IndexOptions::default(),
            hash_builder: DefaultHashBuilder::default(),
        }
    }
}

impl Default for ExtendibleHashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BuildHasher> ExtendibleHashBuilder<S> {
    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn bucket_size(mut self, bucket_size: usize) -> Self {
        self.options.bucket_size = bucket_size;
        self
    }

    pub fn max_global_depth(mut self, max_global_depth: usize) -> Self {
        self.options.max_global_depth = max_global_depth;
        self
    }

    pub fn hasher<T: BuildHasher>(self, hash_builder: T) -> ExtendibleHashBuilder<T> {
        ExtendibleHashBuilder {
            options: self.options,
            hash_builder,
        }
    }

    pub fn build<K: Hash + Eq, V>(self) -> anyhow::Result<ExtendibleHash<K, V, S>> {
        let options = self.options;
        ExtendibleHash::with_options(options, self.hash_builder)
            .with_context(|| format!("invalid page table options {:?}", options))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn starts_with_one_bucket() {
        let table: ExtendibleHash<i32, String> = ExtendibleHash::new(2).unwrap();

        assert_eq!(0, table.global_depth());
        assert_eq!(1, table.num_slots());
        assert_eq!(1, table.num_buckets());
        assert_eq!(Ok(0), table.local_depth(0));
        assert_eq!(2, table.bucket_size());
        assert!(table.is_empty());
    }

    #[test]
    fn rejects_zero_bucket_size() {
        let table = ExtendibleHash::<i32, i32>::new(0);
        assert_eq!(Some(IndexError::ZeroBucketSize), table.err());

        let built = ExtendibleHashBuilder::new().bucket_size(0).build::<i32, i32>();
        assert!(built.is_err());
    }

    #[test]
    fn rejects_unaddressable_depth() {
        let built = ExtendibleHashBuilder::new()
            .max_global_depth(usize::BITS as usize)
            .build::<i32, i32>();

        let err = built.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::InvalidMaxDepth { .. })
        ));
    }

    #[test]
    fn local_depth_out_of_range() {
        let table: ExtendibleHash<i32, i32> = ExtendibleHash::new(4).unwrap();

        assert_eq!(
            Err(IndexError::SlotOutOfRange {
                slot: 1,
                num_slots: 1
            }),
            table.local_depth(1)
        );

        let err = table.local_depth(3).unwrap_err();
        assert_eq!("slot 3 out of range: directory has 1 slots", err.to_string());
    }

    #[test]
    fn grow_aliases_slots() {
        let mut directory: Directory<i32, i32> = Directory::new();
        directory.grow();
        directory.grow();

        assert_eq!(2, directory.global_depth);
        assert_eq!(4, directory.slots.len());
        assert!(directory
            .slots
            .iter()
            .all(|slot| Arc::ptr_eq(slot, &directory.slots[0])));
        assert_eq!(3, directory.slot_of(0b1011));
    }
}
