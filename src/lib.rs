//! Buffer pool core for Geode: the LRU replacer that picks eviction victims
//! and the extendible hash table that serves as the page table.
//!
//! Both structures are independent and thread-safe. A buffer pool manager
//! looks pages up in the page table and asks the replacer which frame to
//! reclaim; neither structure calls the other.

pub mod config;
pub mod errors;
pub mod index;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::IndexOptions;
pub use errors::IndexError;
pub use index::{DirectorySnapshot, ExtendibleHash, ExtendibleHashBuilder, HashTable};
pub use utils::replacer::{LRUReplacer, Replacer};

pub type FrameId = u32;
pub type PageId = u32;
