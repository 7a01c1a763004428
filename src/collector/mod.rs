//! Parallel mark-sweep collector.
//!
//! Marking fans out one task per root: each task visits the blocks the
//! root currently references and ORs their marked bit. Sweeping fans
//! out one task per segment: a linear header walk that clears marks on
//! survivors and frees everything else. Both phases run under the
//! stop-the-world fence established by the heap manager, which holds
//! the root-set lock and every segment lock for the duration.
//!
//! Marking is single-level: blocks are opaque byte payloads, so only
//! root-held references are traced. A runtime with interior references
//! would extend [`RootVisitor`] dispatch to queue payload pointers; the
//! phase structure is otherwise unchanged.

use crate::heap::{Heap, Segment, TOTAL_SEGMENTS};
use crate::pool::WorkerPool;
use crate::roots::{RootSet, RootVisitor};

use crossbeam::sync::WaitGroup;
use std::sync::Arc;

/// Visitor that marks every block it is shown.
pub struct MarkingVisitor;

impl RootVisitor for MarkingVisitor {
    #[inline]
    fn visit_block(&self, block: crate::heap::BlockRef) {
        block.set_marked(true);
    }
}

/// Mark-sweep collector with its own worker pool.
pub struct Collector {
    pool: WorkerPool,
}

impl Collector {
    /// Create a collector backed by `workers` threads.
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            pool: WorkerPool::new(workers, "basalt-collector"),
        }
    }

    /// Run a full mark-sweep pass.
    ///
    /// The caller must hold the root-set lock and every segment lock.
    pub(crate) fn collect(&self, roots: &RootSet, heap: &Arc<Heap>) {
        self.mark(roots);
        self.sweep(heap);
    }

    /// Mark every block directly referenced by a root.
    fn mark(&self, roots: &RootSet) {
        if roots.is_empty() {
            return;
        }

        let wg = WaitGroup::new();
        for root in roots.iter() {
            let root = Arc::clone(root);
            let wg = wg.clone();
            self.pool.execute(move || {
                root.accept(&MarkingVisitor);
                drop(wg);
            });
        }
        wg.wait();
    }

    /// Sweep every segment in parallel.
    fn sweep(&self, heap: &Arc<Heap>) {
        let wg = WaitGroup::new();
        for index in 0..TOTAL_SEGMENTS {
            let heap = Arc::clone(heap);
            let wg = wg.clone();
            self.pool.execute(move || {
                sweep_segment(heap.segment(index));
                drop(wg);
            });
        }
        wg.wait();
    }
}

/// Sweep one segment: clear marks on survivors, free the rest.
///
/// The free lists in the directory are stale after this; the manager's
/// coalescing pass rebuilds them before mutators resume.
fn sweep_segment(segment: &Segment) {
    for block in segment.blocks() {
        if block.is_marked() {
            block.set_marked(false);
        } else {
            block.set_free(true);
        }
    }
}
