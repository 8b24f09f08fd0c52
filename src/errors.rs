/// Errors reported by the page table.
///
/// Lookups that simply miss are not errors; they come back as `None` or
/// `false`. These variants cover construction mistakes and structural limits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Buckets must be able to hold at least one entry.
    #[error("bucket size must be greater than zero")]
    ZeroBucketSize,

    /// Introspection asked for a directory slot that does not exist.
    #[error("slot {slot} out of range: directory has {num_slots} slots")]
    SlotOutOfRange { slot: usize, num_slots: usize },

    /// A split needed one more hash bit than the configured limit allows.
    /// The table is left untouched.
    #[error("directory full: global depth {global_depth} reached limit {max_global_depth}")]
    DirectoryFull {
        global_depth: usize,
        max_global_depth: usize,
    },

    /// The pending key and every entry of its full bucket have the same
    /// 64-bit hash, so no number of splits can separate them.
    #[error("{bucket_size} entries already share hash {hash:#018x}, bucket cannot split")]
    HashCollision { hash: u64, bucket_size: usize },

    /// The configured depth limit cannot be addressed on this platform.
    #[error("max global depth {requested} must be below {limit}")]
    InvalidMaxDepth { requested: usize, limit: usize },
}
