//! Single-slot root variants.

use super::RootVisitor;
use crate::heap::BlockRef;

use parking_lot::Mutex;

/// A global variable root: one nullable block reference.
pub struct GlobalSlot {
    slot: Mutex<Option<BlockRef>>,
}

impl GlobalSlot {
    /// Create a global slot, optionally pointing at a block.
    pub fn new(block: Option<BlockRef>) -> Self {
        Self {
            slot: Mutex::new(block),
        }
    }

    /// Get the referenced block.
    pub fn get(&self) -> Option<BlockRef> {
        *self.slot.lock()
    }

    /// Point the slot at a block (`None` releases the reference).
    pub fn set(&self, block: Option<BlockRef>) {
        *self.slot.lock() = block;
    }

    pub(crate) fn accept(&self, visitor: &dyn RootVisitor) {
        if let Some(block) = *self.slot.lock() {
            visitor.visit_block(block);
        }
    }
}

impl Default for GlobalSlot {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A register root: one nullable block reference held by machine state
/// rather than a named variable.
pub struct RegisterSlot {
    slot: Mutex<Option<BlockRef>>,
}

impl RegisterSlot {
    /// Create a register slot, optionally pointing at a block.
    pub fn new(block: Option<BlockRef>) -> Self {
        Self {
            slot: Mutex::new(block),
        }
    }

    /// Get the referenced block.
    pub fn get(&self) -> Option<BlockRef> {
        *self.slot.lock()
    }

    /// Point the slot at a block (`None` releases the reference).
    pub fn set(&self, block: Option<BlockRef>) {
        *self.slot.lock() = block;
    }

    pub(crate) fn accept(&self, visitor: &dyn RootVisitor) {
        if let Some(block) = *self.slot.lock() {
            visitor.visit_block(block);
        }
    }
}

impl Default for RegisterSlot {
    fn default() -> Self {
        Self::new(None)
    }
}
