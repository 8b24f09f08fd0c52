use std::env;

use anyhow::Context;

pub const DEFAULT_BUCKET_SIZE: usize = 64;
// Every bit of a slot index can be used
pub const DEFAULT_MAX_GLOBAL_DEPTH: usize = usize::BITS as usize - 1;

pub const BUCKET_SIZE_VAR: &str = "GEODE_BUCKET_SIZE";
pub const MAX_GLOBAL_DEPTH_VAR: &str = "GEODE_MAX_GLOBAL_DEPTH";

/// Tuning knobs for the page table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    // Maximum number of entries a bucket holds before it splits
    pub bucket_size: usize,
    // Upper bound on the directory's global depth. The directory never
    // grows past 2^max_global_depth slots.
    pub max_global_depth: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            bucket_size: DEFAULT_BUCKET_SIZE,
            max_global_depth: DEFAULT_MAX_GLOBAL_DEPTH,
        }
    }
}

impl IndexOptions {
    /// Reads `GEODE_BUCKET_SIZE` and `GEODE_MAX_GLOBAL_DEPTH`, keeping the
    /// defaults for variables that are not set.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = IndexOptions::default();

        Ok(IndexOptions {
            bucket_size: read_var(BUCKET_SIZE_VAR)?.unwrap_or(defaults.bucket_size),
            max_global_depth: read_var(MAX_GLOBAL_DEPTH_VAR)?
                .unwrap_or(defaults.max_global_depth),
        })
    }
}

fn read_var(name: &str) -> anyhow::Result<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be an unsigned integer, got {:?}", name, raw)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("cannot read {}", name)),
    }
}
