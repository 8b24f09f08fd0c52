use std::{collections::VecDeque, env};

use anyhow::Context;
use tracing::{debug, info};

use geode_buffer_core::{
    ExtendibleHash, ExtendibleHashBuilder, FrameId, HashTable, IndexOptions, LRUReplacer, PageId,
    Replacer,
};

const HEADER_PAGE_ID: PageId = 0;

// Drives the page table and replacer the way a buffer pool manager would:
// free frames first, then LRU victims. The header page stays pinned.
struct PoolSimulation {
    page_table: ExtendibleHash<PageId, FrameId>,
    replacer: LRUReplacer<FrameId>,
    frames: Vec<Option<PageId>>,
    free_frames: VecDeque<FrameId>,

    hits: usize,
    misses: usize,
    evictions: usize,
}

impl PoolSimulation {
    fn new(num_frames: usize, options: IndexOptions) -> anyhow::Result<Self> {
        let frame_count = FrameId::try_from(num_frames)
            .with_context(|| format!("{} frames do not fit in a frame id", num_frames))?;

        Ok(PoolSimulation {
            page_table: ExtendibleHashBuilder::new().options(options).build()?,
            replacer: LRUReplacer::with_capacity(num_frames),
            frames: vec![None; num_frames],
            free_frames: (0..frame_count).collect(),
            hits: 0,
            misses: 0,
            evictions: 0,
        })
    }

    fn access(&mut self, page_id: PageId) -> anyhow::Result<FrameId> {
        if let Some(frame_id) = self.page_table.find(&page_id) {
            self.hits += 1;
            self.unpin(page_id, frame_id);
            return Ok(frame_id);
        }
        self.misses += 1;

        let frame_id = match self.free_frames.pop_front() {
            Some(frame_id) => frame_id,
            None => {
                let frame_id = self
                    .replacer
                    .victim()
                    .context("every frame is pinned, nothing to evict")?;

                if let Some(evicted) = self.frames[frame_id as usize].take() {
                    self.page_table.remove(&evicted);
                    debug!(evicted, frame_id, "evicted page");
                }
                self.evictions += 1;
                frame_id
            }
        };

        self.frames[frame_id as usize] = Some(page_id);
        self.page_table.insert(page_id, frame_id)?;
        self.unpin(page_id, frame_id);

        Ok(frame_id)
    }

    fn unpin(&self, page_id: PageId, frame_id: FrameId) {
        if page_id == HEADER_PAGE_ID {
            self.replacer.erase(frame_id);
        } else {
            self.replacer.insert(frame_id);
        }
    }
}

fn parse_arg(args: &[String], index: usize, name: &str, default: usize) -> anyhow::Result<usize> {
    match args.get(index) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be an unsigned integer, got {:?}", name, raw)),
        None => Ok(default),
    }
}

fn main() -> anyhow::Result<()> {
    // enable logging
    tracing_subscriber::fmt::try_init().map_err(anyhow::Error::msg)?;

    let args: Vec<String> = env::args().collect();
    let num_frames = parse_arg(&args, 1, "num_frames", 16)?;
    let num_pages = parse_arg(&args, 2, "num_pages", 64)?;
    let num_refs = parse_arg(&args, 3, "num_refs", 1_000)?;

    anyhow::ensure!(num_frames > 0, "num_frames must be greater than zero");
    anyhow::ensure!(num_pages > 0, "num_pages must be greater than zero");

    let options = IndexOptions::from_env()?;
    info!(?options, num_frames, num_pages, num_refs, "starting page table simulation");

    let mut pool = PoolSimulation::new(num_frames, options)?;

    // A hot set of a quarter of the pages is touched every third reference,
    // the remaining references sweep the whole file.
    let hot_pages = (num_pages / 4).max(1);
    for reference in 0..num_refs {
        let page_id = if reference % 3 == 0 {
            reference % hot_pages
        } else {
            reference % num_pages
        };
        let page_id = PageId::try_from(page_id)
            .with_context(|| format!("page {} does not fit in a page id", page_id))?;
        pool.access(page_id)?;
    }

    info!(
        hits = pool.hits,
        misses = pool.misses,
        evictions = pool.evictions,
        resident = pool.page_table.len(),
        bucket_size = pool.page_table.bucket_size(),
        "simulation finished"
    );

    let snapshot = pool.page_table.snapshot();
    snapshot.check_invariants().map_err(anyhow::Error::msg)?;
    print!("{}", snapshot);

    Ok(())
}
