//! Heap manager: the allocation protocol and stop-the-world coordination.
//!
//! Mutator threads call [`HeapManager::allocate`]. The fast path rotates
//! through the request's size class, try-locking one segment at a time
//! and carving the block with a first-fit split. When the fast path is
//! exhausted, exactly one thread wins the collection gate and runs a
//! stop-the-world mark-sweep; everyone else parks until it finishes,
//! then retries once.

use crate::collector::Collector;
use crate::config::{ConfigError, HeapConfig};
use crate::heap::{
    align_up_16, BlockRef, Heap, SizeClass, HEADER_SIZE, MIN_PAYLOAD, SEGMENT_SIZE, TOTAL_SEGMENTS,
};
use crate::pool::WorkerPool;
use crate::roots::{Root, RootSet};
use crate::stats::{GcTimer, HeapStats};

use crossbeam::sync::WaitGroup;
use parking_lot::{Condvar, Mutex, MutexGuard};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fast-path passes over the size class before a collection is forced.
const FAST_ATTEMPTS: usize = 3;

/// Client-facing heap manager.
///
/// Owns the segmented heap, the root-set table, and both worker pools.
/// All methods take `&self`; the manager is shared across mutator
/// threads behind an `Arc` or a plain reference.
pub struct HeapManager {
    /// The segments and their directory, shared with pool tasks.
    heap: Arc<Heap>,
    /// Root-set table behind its single table-level lock.
    root_set: Mutex<RootSet>,
    /// Pool for parallel coalescing.
    pool: WorkerPool,
    /// Mark-sweep collector with its own pool.
    collector: Collector,
    /// Single-flight collection gate.
    gc_in_progress: Mutex<bool>,
    /// Signaled when the winning collector clears the gate.
    gc_finished: Condvar,
    /// Per-class rotation cursors: index of the segment used last.
    cursors: [AtomicUsize; 3],
    /// Allocation and collection counters.
    stats: HeapStats,
}

impl HeapManager {
    /// Create a heap manager with explicit pool sizes.
    ///
    /// Fails with [`ConfigError`] when either count is zero.
    pub fn new(manager_workers: usize, collector_workers: usize) -> Result<Self, ConfigError> {
        Self::with_config(HeapConfig {
            manager_workers,
            collector_workers,
        })
    }

    /// Create a heap manager from a validated configuration.
    pub fn with_config(config: HeapConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            heap: Arc::new(Heap::new()),
            root_set: Mutex::new(RootSet::new()),
            pool: WorkerPool::new(config.manager_workers, "basalt-manager"),
            collector: Collector::new(config.collector_workers),
            gc_in_progress: Mutex::new(false),
            gc_finished: Condvar::new(),
            cursors: [
                AtomicUsize::new(SizeClass::Small.segment_range().end - 1),
                AtomicUsize::new(SizeClass::Medium.segment_range().end - 1),
                AtomicUsize::new(SizeClass::Large.segment_range().end - 1),
            ],
            stats: HeapStats::new(),
        })
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate a block with at least `bytes` of payload.
    ///
    /// Zero-byte requests and requests above the large-object threshold
    /// return `None`; the size is otherwise rounded up to a multiple of
    /// 16. Returns `None` only after the fast-path retries, one
    /// collection, and one post-collection retry have all failed.
    pub fn allocate(&self, bytes: u32) -> Option<BlockRef> {
        if bytes == 0 {
            return None;
        }
        let bytes = align_up_16(bytes);

        for _ in 0..FAST_ATTEMPTS {
            if let Some(block) = self.try_allocate(bytes) {
                self.stats.record_allocation(block.size());
                return Some(block);
            }
        }

        log::trace!("allocation of {bytes} bytes exhausted the fast path; collecting");
        self.single_flight_collect();

        if let Some(block) = self.try_allocate(bytes) {
            self.stats.record_allocation(block.size());
            return Some(block);
        }

        self.stats.record_failure();
        None
    }

    /// One fast-path pass: pick a segment, lock it, first-fit allocate.
    fn try_allocate(&self, bytes: u32) -> Option<BlockRef> {
        let index = self.find_suitable_segment(bytes)?;
        let info = self.heap.directory().entry(index);
        let _guard = info.lock();
        self.allocate_from_segment(index, bytes)
    }

    /// Find a segment in the request's size class that can hold it.
    ///
    /// Scans one past the class's rotation cursor with wrap-around,
    /// rejecting segments on the advisory free-byte counter alone. The
    /// first candidate whose lock is free wins; if every candidate is
    /// contended, the one with the most free bytes is returned and the
    /// caller blocks on its lock. The cursor is validated against the
    /// class range before use, so a stale value only resets the
    /// rotation, never the scan bounds.
    fn find_suitable_segment(&self, bytes: u32) -> Option<usize> {
        let class = SizeClass::of(bytes)?;
        let range = class.segment_range();
        let cursor = &self.cursors[class as usize];
        let segment_count = range.len();

        let last_used = cursor.load(Ordering::Relaxed);
        let start_offset = if range.contains(&last_used) {
            last_used - range.start
        } else {
            0
        };

        let mut fallback: Option<(usize, u32)> = None;

        for step in 0..segment_count {
            let index = range.start + (start_offset + step + 1) % segment_count;
            let info = self.heap.directory().entry(index);

            let free_bytes = info.free_bytes();
            if (free_bytes as usize) < bytes as usize + HEADER_SIZE {
                continue;
            }

            if fallback.map_or(true, |(_, best)| best < free_bytes) {
                fallback = Some((index, free_bytes));
            }

            if info.try_lock().is_none() {
                continue;
            }

            cursor.store(index, Ordering::Relaxed);
            return Some(index);
        }

        fallback.map(|(index, _)| {
            cursor.store(index, Ordering::Relaxed);
            index
        })
    }

    /// First-fit allocation from a segment's free list.
    ///
    /// The caller must hold the segment's lock.
    fn allocate_from_segment(&self, index: usize, bytes: u32) -> Option<BlockRef> {
        let info = self.heap.directory().entry(index);

        let mut prev: Option<BlockRef> = None;
        let mut current = info.free_list_head()?;

        loop {
            if current.is_free() && current.size() >= bytes {
                break;
            }
            prev = Some(current);
            current = current.next()?;
        }

        // Split when the leftover can hold a header plus a minimum payload.
        let remaining = current.size() - bytes;
        if remaining as usize >= HEADER_SIZE + MIN_PAYLOAD {
            // Safety: the segment lock is held and the leftover was checked.
            unsafe {
                current.carve(bytes);
            }
        }

        current.set_free(false);
        current.set_marked(false);

        match prev {
            Some(prev) => prev.set_next(current.next()),
            None => info.set_free_list_head(current.next()),
        }
        current.set_next(None);

        info.sub_free_bytes(current.size() + HEADER_SIZE as u32);
        Some(current)
    }

    // =========================================================================
    // Roots
    // =========================================================================

    /// Add a root under `key`, replacing any existing entry.
    ///
    /// Returns the shared handle for continued client use.
    pub fn add_root(&self, key: impl Into<String>, root: Root) -> Arc<Root> {
        self.root_set.lock().insert(key.into(), root)
    }

    /// Get a shared handle to the root under `key`.
    pub fn get_root(&self, key: &str) -> Option<Arc<Root>> {
        self.root_set.lock().get(key)
    }

    /// Remove the root under `key`. Silent when absent.
    pub fn remove_root(&self, key: &str) {
        self.root_set.lock().remove(key);
    }

    /// Drop every root.
    pub fn clear_roots(&self) {
        self.root_set.lock().clear();
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Run a stop-the-world collection.
    ///
    /// Acquires the root-set lock and every segment lock, marks from the
    /// roots, sweeps every segment, and coalesces adjacent free blocks
    /// before releasing. Blocks the caller for the full cycle; must not
    /// be called from a pool worker.
    pub fn collect_garbage(&self) {
        let timer = GcTimer::start("stop-the-world collection");

        let root_set = self.root_set.lock();
        let mut segment_guards: SmallVec<[MutexGuard<'_, ()>; TOTAL_SEGMENTS]> = SmallVec::new();
        for index in 0..TOTAL_SEGMENTS {
            segment_guards.push(self.heap.directory().entry(index).lock());
        }

        let free_before = self.heap.directory().total_free_bytes();
        self.collector.collect(&root_set, &self.heap);
        self.coalesce_segments();
        let free_after = self.heap.directory().total_free_bytes();

        drop(segment_guards);
        drop(root_set);

        let elapsed = timer.stop();
        self.stats.record_collection(elapsed);
        log::debug!(
            "collection reclaimed {} bytes in {:?}",
            free_after.saturating_sub(free_before),
            elapsed
        );
    }

    /// Collection gate: the winner collects, everyone else parks.
    fn single_flight_collect(&self) {
        let mut in_progress = self.gc_in_progress.lock();
        if *in_progress {
            while *in_progress {
                self.gc_finished.wait(&mut in_progress);
            }
            return;
        }
        *in_progress = true;
        drop(in_progress);

        self.collect_garbage();

        *self.gc_in_progress.lock() = false;
        self.gc_finished.notify_all();
    }

    /// Rebuild every segment's free list, merging adjacent free blocks.
    fn coalesce_segments(&self) {
        let wg = WaitGroup::new();
        for index in 0..TOTAL_SEGMENTS {
            let heap = Arc::clone(&self.heap);
            let wg = wg.clone();
            self.pool.execute(move || {
                coalesce_segment(&heap, index);
                drop(wg);
            });
        }
        wg.wait();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the heap for introspection.
    ///
    /// Header walks are only meaningful while the heap is quiescent.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Get allocation and collection statistics.
    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }
}

/// Merge adjacent free blocks and republish one segment's free list.
///
/// Walks headers left to right, greedily absorbing each free block's
/// free successors (the merged block swallows the successor's header
/// into its size, and the outer step always advances by the post-merge
/// size). Free blocks are pushed onto a fresh list; the directory entry
/// is updated last. A header with a zero size or one that crosses the
/// segment end truncates the scan: the remainder of that segment stays
/// unreachable until a later cycle rediscovers a consistent chain.
fn coalesce_segment(heap: &Heap, index: usize) {
    let segment = heap.segment(index);
    let info = heap.directory().entry(index);

    let mut free_list: Option<BlockRef> = None;
    let mut free_bytes: u32 = 0;

    let mut offset = 0;
    while offset + HEADER_SIZE <= SEGMENT_SIZE {
        let block = segment.block_at(offset);
        let size = block.size() as usize;
        if size == 0 || offset + HEADER_SIZE + size > SEGMENT_SIZE {
            log::warn!("segment {index}: corrupt header at offset {offset:#x}, truncating scan");
            break;
        }

        let mut next_offset = offset + HEADER_SIZE + size;
        while next_offset + HEADER_SIZE <= SEGMENT_SIZE {
            let next = segment.block_at(next_offset);
            if !block.is_free() || !next.is_free() {
                break;
            }
            block.set_size(block.size() + HEADER_SIZE as u32 + next.size());
            next_offset = offset + HEADER_SIZE + block.size() as usize;
        }

        if block.is_free() {
            block.set_next(free_list);
            free_list = Some(block);
            free_bytes += block.size() + HEADER_SIZE as u32;
        }

        offset += HEADER_SIZE + block.size() as usize;
    }

    info.set_free_list_head(free_list);
    info.set_free_bytes(free_bytes);
}
