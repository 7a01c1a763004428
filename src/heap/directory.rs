//! Segment directory: per-segment free-list bookkeeping.
//!
//! Each segment has one directory entry holding its allocation mutex,
//! the head of its in-place free list, and an advisory free-byte
//! counter used for fast rejection during segment search.

use super::block::BlockRef;

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Bookkeeping for one segment.
pub struct SegmentInfo {
    /// Allocation lock. Held by exactly one allocating thread on the
    /// fast path; the collector holds all of them during stop-the-world.
    lock: Mutex<()>,
    /// Head of the segment's free list (header address, 0 when empty).
    /// Guarded by `lock` or the STW fence.
    free_list_head: AtomicUsize,
    /// Advisory free-byte accounting: the sum of `size + 16` over blocks
    /// on the free list. Read without the lock during segment search;
    /// the mutex remains the authoritative guard.
    free_bytes: AtomicU32,
}

impl SegmentInfo {
    fn new(head: BlockRef, free_bytes: u32) -> Self {
        Self {
            lock: Mutex::new(()),
            free_list_head: AtomicUsize::new(head.addr()),
            free_bytes: AtomicU32::new(free_bytes),
        }
    }

    /// Acquire the segment's allocation lock, blocking.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Try to acquire the segment's allocation lock without blocking.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.lock.try_lock()
    }

    /// Get the head of the free list.
    #[inline]
    pub fn free_list_head(&self) -> Option<BlockRef> {
        let addr = self.free_list_head.load(Ordering::Relaxed);
        if addr == 0 {
            None
        } else {
            // Safety: a non-zero head is always a header address published
            // by this heap under the segment lock or the STW fence.
            Some(unsafe { BlockRef::from_addr(addr) })
        }
    }

    /// Publish a new free-list head.
    #[inline]
    pub(crate) fn set_free_list_head(&self, head: Option<BlockRef>) {
        self.free_list_head
            .store(head.map_or(0, |block| block.addr()), Ordering::Relaxed);
    }

    /// Get the advisory free-byte count.
    #[inline]
    pub fn free_bytes(&self) -> u32 {
        self.free_bytes.load(Ordering::Acquire)
    }

    /// Publish a recomputed free-byte count.
    #[inline]
    pub(crate) fn set_free_bytes(&self, bytes: u32) {
        self.free_bytes.store(bytes, Ordering::Release);
    }

    /// Subtract an allocation from the free-byte count.
    #[inline]
    pub(crate) fn sub_free_bytes(&self, bytes: u32) {
        self.free_bytes.fetch_sub(bytes, Ordering::Release);
    }
}

/// Fixed-length directory mapping segment index to its bookkeeping.
///
/// Built once at heap construction; no resizing, no eviction.
pub struct SegmentDirectory {
    entries: Box<[SegmentInfo]>,
}

impl SegmentDirectory {
    /// Build the directory from each segment's initial state.
    pub(crate) fn new(initial: impl IntoIterator<Item = (BlockRef, u32)>) -> Self {
        let entries = initial
            .into_iter()
            .map(|(head, free_bytes)| SegmentInfo::new(head, free_bytes))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { entries }
    }

    /// Get the entry for a segment index.
    #[inline]
    pub fn entry(&self, index: usize) -> &SegmentInfo {
        &self.entries[index]
    }

    /// Number of segments in the directory.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the directory is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum the advisory free-byte counters across every segment.
    pub fn total_free_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|info| u64::from(info.free_bytes()))
            .sum()
    }
}
