pub(crate) mod bucket;
pub mod extendible_hash;
pub mod hash_table;
pub mod snapshot;

pub use extendible_hash::{DefaultHashBuilder, ExtendibleHash, ExtendibleHashBuilder};
pub use hash_table::HashTable;
pub use snapshot::{DirectorySnapshot, SlotInfo};
