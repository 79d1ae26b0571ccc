//! Visitor interfaces shared by the collectors and their collaborators.
//!
//! A *slot* is the address of a word holding an [`Object`]. Pointer visitors
//! may rewrite any slot they are handed.

use crate::object::HeapObject;
use core_types::{Address, Object};

/// Visits reference slots.
pub trait PointerVisitor {
    /// Visits the slots in `[start, end)`.
    fn visit_block(&mut self, start: Address, end: Address);

    /// Visits a single slot.
    fn visit(&mut self, slot: Address) {
        self.visit_block(slot, slot.word(1));
    }

    /// Visits the class slot of an object.
    ///
    /// During a scavenge the slot may hold a forwarding word instead of a
    /// class, so visitors that care override this.
    fn visit_class(&mut self, slot: Address) {
        self.visit_block(slot, slot.word(1));
    }

    /// Visits references held outside the heap.
    fn visit_slice(&mut self, slots: &mut [Object]) {
        if slots.is_empty() {
            return;
        }
        let range = slots.as_mut_ptr_range();
        self.visit_block(Address::from_ptr(range.start), Address::from_ptr(range.end));
    }
}

/// Visits every object of a space in address order.
pub trait HeapObjectVisitor {
    /// Visits `object` and returns its size in bytes.
    fn visit(&mut self, object: HeapObject) -> usize;

    /// Called once the end of a chunk is reached.
    fn chunk_end(&mut self, _end: Address) {}
}

/// Supplies the roots of a collection.
pub trait RootProvider {
    /// Hands every root slot to `visitor`.
    fn iterate_roots(&mut self, visitor: &mut dyn PointerVisitor);
}

impl<F> RootProvider for F
where
    F: FnMut(&mut dyn PointerVisitor),
{
    fn iterate_roots(&mut self, visitor: &mut dyn PointerVisitor) {
        self(visitor)
    }
}

/// A root provider with no roots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRoots;

impl RootProvider for NoRoots {
    fn iterate_roots(&mut self, _visitor: &mut dyn PointerVisitor) {}
}
