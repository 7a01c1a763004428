//! Basalt — a concurrent segregated-fit mark-sweep managed heap.
//!
//! A client-facing heap manager hands out raw block slots carved from
//! fixed-size memory segments, tracks reachability from a mutable root
//! set, and — when allocation pressure demands — stops the world, marks
//! live blocks from the roots, sweeps the unmarked ones, and coalesces
//! adjacent free regions before retrying.
//!
//! # Architecture
//!
//! - **Segments**: eight 4 MiB regions split into three size classes
//!   (small / medium / large). Each segment threads a free list through
//!   its in-band 16-byte block headers.
//!
//! - **Allocation**: lock one segment, first-fit with splitting.
//!   Segment choice rotates through the size class on atomic cursors
//!   and try-locks, so the per-segment mutex is rarely contended.
//!
//! - **Collection**: stop-the-world. One allocating thread wins the
//!   single-flight gate and runs the collector; marking fans out one
//!   task per root, sweeping and coalescing one task per segment.
//!
//! Marking is single-level: blocks are opaque byte payloads and only
//! root-held references are traced.
//!
//! # Usage
//!
//! ```ignore
//! use basalt::{GlobalSlot, HeapManager, Root};
//!
//! let heap = HeapManager::new(2, 2)?;
//!
//! let block = heap.allocate(64).expect("out of memory");
//! let root = heap.add_root("g", Root::Global(GlobalSlot::new(Some(block))));
//!
//! heap.collect_garbage();          // `block` survives: it is rooted
//!
//! root.as_global().unwrap().set(None);
//! heap.collect_garbage();          // `block` is reclaimed
//! ```
//!
//! # Safety
//!
//! A [`BlockRef`] stays dereferenceable for the lifetime of the manager
//! that produced it, but the block it names is reclaimed by the first
//! collection that does not observe it through a root. Clients must
//! keep a root slot pointing at every block they still use.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod heap;
pub mod pool;
pub mod roots;
pub mod stats;

mod manager;

// Re-exports for convenient access
pub use config::{ConfigError, HeapConfig};
pub use heap::{BlockHeader, BlockRef, SizeClass};
pub use manager::HeapManager;
pub use roots::{
    CountingVisitor, GlobalSlot, RegisterSlot, Root, RootError, RootSet, RootVisitor, ScopeStack,
};
pub use stats::HeapStats;
