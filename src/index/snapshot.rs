use std::{
    collections::{HashMap, HashSet},
    fmt,
};

/// One directory slot as seen by [`DirectorySnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    // Buckets are numbered in order of first appearance in the directory
    pub bucket_id: usize,
    pub local_depth: usize,
    pub len: usize,
}

/// Consistent copy of the page table's directory, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub global_depth: usize,
    pub bucket_size: usize,
    pub slots: Vec<SlotInfo>,
}

impl DirectorySnapshot {
    pub fn num_buckets(&self) -> usize {
        self.distinct().count()
    }

    /// Total entries, counting aliased buckets once.
    pub fn len(&self) -> usize {
        self.distinct().map(|slot| slot.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verifies the structural invariants of an extendible directory:
    /// `2^global_depth` slots, no local depth above the global depth, no
    /// bucket above capacity, and a bucket of local depth `d` aliased by
    /// exactly the slots sharing its low `d` bits.
    ///
    /// Runs in time linear in the number of slots.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.slots.len() != 1 << self.global_depth {
            return Err(format!(
                "directory has {} slots at global depth {}",
                self.slots.len(),
                self.global_depth
            ));
        }

        // bucket id -> (low bits shared by its slots, local depth, slot count)
        let mut buckets: HashMap<usize, (usize, usize, usize)> = HashMap::new();

        for (index, slot) in self.slots.iter().enumerate() {
            if slot.local_depth > self.global_depth {
                return Err(format!(
                    "slot {} has local depth {} above global depth {}",
                    index, slot.local_depth, self.global_depth
                ));
            }

            if slot.len > self.bucket_size {
                return Err(format!(
                    "slot {} holds {} entries, capacity is {}",
                    index, slot.len, self.bucket_size
                ));
            }

            let low = index & ((1usize << slot.local_depth) - 1);
            let entry = buckets
                .entry(slot.bucket_id)
                .or_insert((low, slot.local_depth, 0));

            if entry.0 != low || entry.1 != slot.local_depth {
                return Err(format!(
                    "slot {} disagrees with bucket {} on its low bits at local depth {}",
                    index, slot.bucket_id, slot.local_depth
                ));
            }
            entry.2 += 1;
        }

        // All of a bucket's slots share its low bits, so the count is
        // enough to prove no matching slot points elsewhere
        for (bucket_id, (_, local_depth, count)) in buckets {
            let expected = 1usize << (self.global_depth - local_depth);
            if count != expected {
                return Err(format!(
                    "bucket {} at local depth {} is aliased by {} slots, expected {}",
                    bucket_id, local_depth, count, expected
                ));
            }
        }

        Ok(())
    }

    fn distinct(&self) -> impl Iterator<Item = &SlotInfo> + '_ {
        let mut seen = HashSet::new();
        self.slots.iter().filter(move |slot| seen.insert(slot.bucket_id))
    }
}

impl fmt::Display for DirectorySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "global depth {}, {} slots, {} buckets, {} entries",
            self.global_depth,
            self.slots.len(),
            self.num_buckets(),
            self.len()
        )?;
        writeln!(f, "{:>6}  {:>8}  {:>6}  {:>5}  {:>7}", "slot", "bits", "bucket", "local", "entries")?;

        let width = self.global_depth.max(1);
        for (index, slot) in self.slots.iter().enumerate() {
            writeln!(
                f,
                "{:>6}  {:>8}  {:>6}  {:>5}  {:>7}",
                index,
                format!("{:0width$b}", index, width = width),
                slot.bucket_id,
                slot.local_depth,
                slot.len
            )?;
        }

        Ok(())
    }
}
