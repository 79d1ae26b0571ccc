//! Marking phase of the mark-sweep collector.
//!
//! Marking never recurses: newly marked objects are pushed on a
//! [`MarkingStack`] made of fixed-size chunks and scanned from there.

use crate::format::ObjectType;
use crate::kinds::Stack;
use crate::object::{load_slot, HeapObject};
use crate::old_space::OldSpace;
use crate::space::{GcPhase, Space};
use crate::visitor::PointerVisitor;
use core_types::{Address, Object};

/// Entries per marking stack chunk.
pub const MARKING_STACK_CHUNK_CAPACITY: usize = 128;

/// A fixed-capacity block of the marking stack.
#[derive(Debug)]
pub struct MarkingStackChunk {
    entries: Vec<HeapObject>,
    next: Option<Box<MarkingStackChunk>>,
}

impl MarkingStackChunk {
    fn new() -> Box<Self> {
        Box::new(MarkingStackChunk {
            entries: Vec::with_capacity(MARKING_STACK_CHUNK_CAPACITY),
            next: None,
        })
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == MARKING_STACK_CHUNK_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn pop(&mut self) -> Option<HeapObject> {
        self.entries.pop()
    }
}

/// Unbounded stack of objects waiting to be scanned.
///
/// Pushing onto a full chunk starts a new one in front of it.
#[derive(Debug)]
pub struct MarkingStack {
    current: Box<MarkingStackChunk>,
}

impl Default for MarkingStack {
    fn default() -> Self {
        MarkingStack {
            current: MarkingStackChunk::new(),
        }
    }
}

impl MarkingStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: HeapObject) {
        if self.current.is_full() {
            let full = std::mem::replace(&mut self.current, MarkingStackChunk::new());
            self.current.next = Some(full);
        }
        self.current.entries.push(object);
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.current.next.is_none()
    }

    /// Number of chunks in use.
    pub fn chunk_count(&self) -> usize {
        std::iter::successors(Some(&*self.current), |chunk| chunk.next.as_deref()).count()
    }

    /// Detaches one non-empty chunk to be drained, or `None` when empty.
    fn take_chunk(&mut self) -> Option<Box<MarkingStackChunk>> {
        if let Some(mut next) = self.current.next.take() {
            self.current.next = next.next.take();
            return Some(next);
        }
        if self.current.is_empty() {
            return None;
        }
        Some(std::mem::replace(&mut self.current, MarkingStackChunk::new()))
    }

    /// Scans every object on the stack of `marker`, including the ones
    /// pushed while scanning, until the stack is empty.
    pub fn process<M: MarkingScan + ?Sized>(marker: &mut M) {
        while let Some(mut chunk) = marker.marking_stack().take_chunk() {
            while let Some(object) = chunk.pop() {
                object.iterate_pointers(marker);
            }
        }
    }
}

/// A pointer visitor that marks through its own [`MarkingStack`].
pub trait MarkingScan: PointerVisitor {
    fn marking_stack(&mut self) -> &mut MarkingStack;
}

/// Marks every old-space object reachable from the visited slots.
pub struct MarkingVisitor<'a> {
    space: &'a OldSpace,
    stack: MarkingStack,
}

impl<'a> MarkingVisitor<'a> {
    pub fn new(space: &'a OldSpace) -> Self {
        debug_assert_eq!(space.phase(), GcPhase::Marking);
        MarkingVisitor {
            space,
            stack: MarkingStack::new(),
        }
    }

    /// Returns the object if it is an unmarked old-space object.
    fn unmarked(&self, value: Object) -> Option<HeapObject> {
        let object = HeapObject::try_cast(value)?;
        (self.space.includes(object.address()) && !object.is_marked(self.space.metadata()))
            .then_some(object)
    }

    fn mark(&mut self, object: HeapObject) {
        object.set_mark(self.space.metadata());
        self.stack.push(object);
    }
}

impl PointerVisitor for MarkingVisitor<'_> {
    fn visit_block(&mut self, start: Address, end: Address) {
        let mut slot = start;
        while slot < end {
            if let Some(object) = self.unmarked(load_slot(slot)) {
                self.mark(object);
            }
            slot = slot.word(1);
        }
    }
}

impl MarkingScan for MarkingVisitor<'_> {
    fn marking_stack(&mut self) -> &mut MarkingStack {
        &mut self.stack
    }
}

/// A [`MarkingVisitor`] that also links every stack it marks behind the
/// process stack.
///
/// The first stack marked is the process stack; the driver visits its slot
/// first. Its `next` is cleared so the chain is rebuilt.
pub struct MarkAndChainStacksVisitor<'a> {
    inner: MarkingVisitor<'a>,
    process_stack: Option<Stack>,
    number_of_stacks: usize,
}

impl<'a> MarkAndChainStacksVisitor<'a> {
    pub fn new(space: &'a OldSpace) -> Self {
        MarkAndChainStacksVisitor {
            inner: MarkingVisitor::new(space),
            process_stack: None,
            number_of_stacks: 0,
        }
    }

    pub fn number_of_stacks(&self) -> usize {
        self.number_of_stacks
    }

    fn chain_stack(&mut self, stack: Stack) {
        self.number_of_stacks += 1;
        match self.process_stack {
            None => {
                stack.set_next(None);
                self.process_stack = Some(stack);
            }
            Some(process_stack) => {
                stack.set_next_word(process_stack.next_word());
                process_stack.set_next(Some(stack));
            }
        }
    }
}

impl PointerVisitor for MarkAndChainStacksVisitor<'_> {
    fn visit_block(&mut self, start: Address, end: Address) {
        let mut slot = start;
        while slot < end {
            if let Some(object) = self.inner.unmarked(load_slot(slot)) {
                if object.object_type() == ObjectType::Stack {
                    self.chain_stack(Stack::cast(object));
                }
                self.inner.mark(object);
            }
            slot = slot.word(1);
        }
    }
}

impl MarkingScan for MarkAndChainStacksVisitor<'_> {
    fn marking_stack(&mut self) -> &mut MarkingStack {
        &mut self.inner.stack
    }
}
