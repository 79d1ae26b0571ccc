//! Copying collection of new space.
//!
//! A scavenge visits the roots with one of the visitors below. Each
//! reference into the from-space is replaced by the address of a copy,
//! made on first sight and found through the forwarding word afterwards.
//! The copies are then scanned in place (breadth first) until the scan
//! catches up with allocation.

use crate::format::ObjectType;
use crate::kinds::Stack;
use crate::object::{load_slot, store_slot, HeapObject};
use crate::old_space::OldSpace;
use crate::semi_space::SemiSpace;
use crate::space::{GcPhase, NoAllocationFailureScope, Space};
use crate::visitor::PointerVisitor;
use core_types::{fatal, Address, FatalError};

/// Where a generational scavenge notes that a scanned object still points
/// into new space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Record {
    /// Nothing to note (scanning new space itself).
    #[default]
    Dummy,
    /// Dirty the remembered-set card of the object at this address.
    Card(Address),
}

/// A pointer visitor that copies into a semi-space it owns.
pub trait ScavengeScan: PointerVisitor {
    fn to_space(&mut self) -> &mut SemiSpace;

    /// Sets the record for the slots visited next.
    fn set_record(&mut self, _record: Record) {}
}

/// A scavenge visitor that also promotes into old space.
pub trait PromotionScan: ScavengeScan {
    fn old_space(&mut self) -> &mut OldSpace;
}

fn copy_or_die(object: HeapObject, to: &mut SemiSpace) -> HeapObject {
    match object.clone_in_to_space(to) {
        Some(copy) => copy,
        None => fatal(FatalError::ScavengeExhausted {
            size: object.size(),
        }),
    }
}

/// Forwards references into `from` to copies in `to`.
pub struct ScavengeVisitor<'a> {
    from: &'a SemiSpace,
    to: &'a mut SemiSpace,
}

impl<'a> ScavengeVisitor<'a> {
    pub fn new(from: &'a SemiSpace, to: &'a mut SemiSpace) -> Self {
        debug_assert_eq!(from.phase(), GcPhase::Scavenging);
        ScavengeVisitor { from, to }
    }
}

impl PointerVisitor for ScavengeVisitor<'_> {
    fn visit_block(&mut self, start: Address, end: Address) {
        let mut slot = start;
        while slot < end {
            if let Some(object) = HeapObject::try_cast(load_slot(slot)) {
                if self.from.includes(object.address()) {
                    let copy = copy_or_die(object, self.to);
                    store_slot(slot, copy.as_object());
                }
            }
            slot = slot.word(1);
        }
    }
}

impl ScavengeScan for ScavengeVisitor<'_> {
    fn to_space(&mut self) -> &mut SemiSpace {
        self.to
    }
}

/// A [`ScavengeVisitor`] that also links every copied stack behind the
/// process stack through the stacks' `next` fields.
///
/// The first stack copied is taken to be the process stack, so the driver
/// visits the process stack slot before any other root. Its `next` is
/// cleared so the chain is rebuilt on each collection.
pub struct ScavengeAndChainStacksVisitor<'a> {
    inner: ScavengeVisitor<'a>,
    process_stack: Option<Stack>,
    number_of_stacks: usize,
}

impl<'a> ScavengeAndChainStacksVisitor<'a> {
    pub fn new(from: &'a SemiSpace, to: &'a mut SemiSpace) -> Self {
        ScavengeAndChainStacksVisitor {
            inner: ScavengeVisitor::new(from, to),
            process_stack: None,
            number_of_stacks: 0,
        }
    }

    /// Stacks found so far, the process stack included.
    pub fn number_of_stacks(&self) -> usize {
        self.number_of_stacks
    }

    pub fn process_stack(&self) -> Option<Stack> {
        self.process_stack
    }

    fn chain_stack(&mut self, copy: Stack) {
        self.number_of_stacks += 1;
        match self.process_stack {
            None => {
                copy.set_next(None);
                self.process_stack = Some(copy);
            }
            Some(process_stack) => {
                copy.set_next_word(process_stack.next_word());
                process_stack.set_next(Some(copy));
            }
        }
    }
}

impl PointerVisitor for ScavengeAndChainStacksVisitor<'_> {
    fn visit_block(&mut self, start: Address, end: Address) {
        let mut slot = start;
        while slot < end {
            if let Some(object) = HeapObject::try_cast(load_slot(slot)) {
                if self.inner.from.includes(object.address()) {
                    let copy = match object.forwarding_address() {
                        Some(copy) => copy,
                        None => {
                            let is_stack = object.object_type() == ObjectType::Stack;
                            let copy = copy_or_die(object, self.inner.to);
                            if is_stack {
                                self.chain_stack(Stack::cast(copy));
                            }
                            copy
                        }
                    };
                    store_slot(slot, copy.as_object());
                }
            }
            slot = slot.word(1);
        }
    }
}

impl ScavengeScan for ScavengeAndChainStacksVisitor<'_> {
    fn to_space(&mut self) -> &mut SemiSpace {
        self.inner.to
    }
}

/// Scavenges the new space of a two-space heap.
///
/// Objects below the from-space water mark have already survived one
/// scavenge and are promoted into old space; younger ones are copied into
/// to-space. If old space refuses a promotion the object stays young and
/// an old-space collection is requested.
///
/// To-space never grows. Once it is full, survivors are promoted whatever
/// their age, with old space growing past its budget if it must.
pub struct GenerationalScavengeVisitor<'a> {
    from: &'a SemiSpace,
    to: &'a mut SemiSpace,
    old: &'a mut OldSpace,
    water_mark: Address,
    promote_all: bool,
    record: Record,
    trigger_old_space_gc: bool,
    promoted: usize,
}

impl<'a> GenerationalScavengeVisitor<'a> {
    pub fn new(from: &'a SemiSpace, to: &'a mut SemiSpace, old: &'a mut OldSpace) -> Self {
        debug_assert_eq!(from.phase(), GcPhase::Scavenging);
        GenerationalScavengeVisitor {
            water_mark: from.water_mark(),
            from,
            to,
            old,
            promote_all: false,
            record: Record::Dummy,
            trigger_old_space_gc: false,
            promoted: 0,
        }
    }

    /// True if a promotion failed and old space should be collected.
    pub fn trigger_old_space_gc(&self) -> bool {
        self.trigger_old_space_gc
    }

    /// Promotes every survivor, young or not, regardless of the old-space
    /// budget.
    pub fn promoting_all(mut self) -> Self {
        self.promote_all = true;
        self
    }

    /// Bytes copied into old space.
    pub fn promoted(&self) -> usize {
        self.promoted
    }

    fn forward(&mut self, object: HeapObject) -> HeapObject {
        if let Some(copy) = object.forwarding_address() {
            return copy;
        }
        if self.promote_all {
            return self.promote_or_die(object);
        }
        if object.address() < self.water_mark {
            let size = object.size();
            if let Some(copy) = object.clone_in_to_space(self.old) {
                self.promoted += size;
                return copy;
            }
            self.trigger_old_space_gc = true;
        }
        match object.clone_in_to_space(self.to) {
            Some(copy) => copy,
            None => self.promote_or_die(object),
        }
    }

    /// Promotes `object` even past the old-space budget. Only running out
    /// of pages is fatal.
    fn promote_or_die(&mut self, object: HeapObject) -> HeapObject {
        let size = object.size();
        let copy = {
            let mut old = NoAllocationFailureScope::new(&mut *self.old);
            object.clone_in_to_space(&mut *old)
        };
        let Some(copy) = copy else {
            fatal(FatalError::ScavengeExhausted { size })
        };
        self.promoted += size;
        if self.old.needs_garbage_collection() {
            self.trigger_old_space_gc = true;
        }
        copy
    }
}

impl PointerVisitor for GenerationalScavengeVisitor<'_> {
    fn visit_block(&mut self, start: Address, end: Address) {
        let mut slot = start;
        while slot < end {
            if let Some(object) = HeapObject::try_cast(load_slot(slot)) {
                if self.from.includes(object.address()) {
                    let copy = self.forward(object);
                    store_slot(slot, copy.as_object());
                    if let Record::Card(holder) = self.record {
                        if self.to.includes(copy.address()) {
                            self.old.metadata().insert_into_remembered_set(holder);
                        }
                    }
                }
            }
            slot = slot.word(1);
        }
    }
}

impl ScavengeScan for GenerationalScavengeVisitor<'_> {
    fn to_space(&mut self) -> &mut SemiSpace {
        self.to
    }

    fn set_record(&mut self, record: Record) {
        self.record = record;
    }
}

impl PromotionScan for GenerationalScavengeVisitor<'_> {
    fn old_space(&mut self) -> &mut OldSpace {
        self.old
    }
}
