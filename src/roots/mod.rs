//! Root tracking.
//!
//! Roots are the externally mutable slots that keep blocks reachable
//! across collections. Three variants exist: a scoped per-thread stack
//! of named variables, a single-slot global, and a single-slot
//! register. The root-set table maps string keys to shared handles so
//! mutators can keep using a root without holding the table lock.

mod scope_stack;
mod slot;

pub use scope_stack::ScopeStack;
pub use slot::{GlobalSlot, RegisterSlot};

use crate::heap::BlockRef;

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Visitor over the blocks a root currently references.
///
/// The collector's marker implements this to set the marked bit; test
/// doubles implement it to observe reachability.
pub trait RootVisitor: Sync {
    /// Called once for every non-null block reference held by a root.
    fn visit_block(&self, block: BlockRef);
}

/// A root-set entry: one of the three root variants.
///
/// The collector pattern-matches on the variant; each arm locks the
/// variant's internal state for the duration of the visit.
pub enum Root {
    /// Scoped thread-local stack of named variables.
    Scoped(ScopeStack),
    /// Single-slot global variable.
    Global(GlobalSlot),
    /// Single-slot register variable.
    Register(RegisterSlot),
}

impl Root {
    /// Report every referenced block to the visitor.
    pub fn accept(&self, visitor: &dyn RootVisitor) {
        match self {
            Root::Scoped(stack) => stack.accept(visitor),
            Root::Global(slot) => slot.accept(visitor),
            Root::Register(slot) => slot.accept(visitor),
        }
    }

    /// Get the scoped stack variant, if this is one.
    pub fn as_scoped(&self) -> Option<&ScopeStack> {
        match self {
            Root::Scoped(stack) => Some(stack),
            _ => None,
        }
    }

    /// Get the global slot variant, if this is one.
    pub fn as_global(&self) -> Option<&GlobalSlot> {
        match self {
            Root::Global(slot) => Some(slot),
            _ => None,
        }
    }

    /// Get the register slot variant, if this is one.
    pub fn as_register(&self) -> Option<&RegisterSlot> {
        match self {
            Root::Register(slot) => Some(slot),
            _ => None,
        }
    }
}

/// Errors from named root operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootError {
    /// A variable with this name is already live.
    AlreadyDefined(String),
    /// No live variable has this name.
    NotFound(String),
}

impl fmt::Display for RootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootError::AlreadyDefined(name) => {
                write!(f, "variable `{name}` is already defined")
            }
            RootError::NotFound(name) => write!(f, "variable `{name}` does not exist"),
        }
    }
}

impl std::error::Error for RootError {}

/// Table of named roots.
///
/// Keys are unique; insertion replaces. The table itself carries no
/// lock — the heap manager serializes all access behind a single
/// table-level mutex, including the collector's iteration.
pub struct RootSet {
    roots: FxHashMap<String, Arc<Root>>,
}

impl RootSet {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            roots: FxHashMap::default(),
        }
    }

    /// Insert a root, replacing any existing entry under the key.
    ///
    /// Returns the shared handle so the caller can keep mutating the
    /// root after the table lock is released.
    pub fn insert(&mut self, key: String, root: Root) -> Arc<Root> {
        let root = Arc::new(root);
        self.roots.insert(key, Arc::clone(&root));
        root
    }

    /// Get a shared handle to a root.
    pub fn get(&self, key: &str) -> Option<Arc<Root>> {
        self.roots.get(key).cloned()
    }

    /// Remove a root. Silent when the key is absent.
    pub fn remove(&mut self, key: &str) {
        self.roots.remove(key);
    }

    /// Drop every root.
    pub fn clear(&mut self) {
        self.roots.clear();
    }

    /// Number of roots in the table.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Iterate the root handles in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Root>> {
        self.roots.values()
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}

/// A counting visitor for tests and diagnostics.
pub struct CountingVisitor {
    visited: AtomicUsize,
}

impl CountingVisitor {
    /// Create a visitor with a zeroed count.
    pub fn new() -> Self {
        Self {
            visited: AtomicUsize::new(0),
        }
    }

    /// Number of blocks visited so far.
    pub fn count(&self) -> usize {
        self.visited.load(Ordering::Relaxed)
    }
}

impl Default for CountingVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl RootVisitor for CountingVisitor {
    fn visit_block(&self, _block: BlockRef) {
        self.visited.fetch_add(1, Ordering::Relaxed);
    }
}
