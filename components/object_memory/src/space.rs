//! The space abstraction shared by the copying and the mark-sweep spaces.
//!
//! A space owns a list of [`Chunk`]s and a bump cursor (`top`/`limit`) into
//! the chunk currently being filled. Every chunk stays linearly parseable:
//! objects follow each other back to back and a Smi zero sentinel marks
//! where the allocated part ends.

use crate::chunk::Chunk;
use crate::gc_metadata::GcMetadata;
use crate::logging::log_chunk_allocated;
use crate::object::{load_slot, store_slot, HeapObject};
use crate::visitor::HeapObjectVisitor;
use core_types::{Address, Object, WORD_SIZE};
use page_allocator::PAGE_SIZE;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Smallest chunk a growing space asks for.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = PAGE_SIZE;

/// Largest chunk a growing space asks for by default.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 256 * 1024;

/// Space taken by the end-of-chunk sentinel.
pub const SENTINEL_SIZE: usize = WORD_SIZE;

/// Chunk size for a space currently holding `heap_size` bytes.
///
/// Grows with the heap (a fifth of it) between one page and 256 KiB.
pub fn default_chunk_size(heap_size: usize) -> usize {
    (heap_size / 5).clamp(DEFAULT_MIN_CHUNK_SIZE, DEFAULT_MAX_CHUNK_SIZE)
}

pub(crate) fn write_sentinel_at(address: Address) {
    store_slot(address, Object::ZERO);
}

pub(crate) fn has_sentinel_at(address: Address) -> bool {
    load_slot(address) == Object::ZERO
}

/// What a space is doing right now.
///
/// The forwarding header variant may only exist while a space is
/// [`GcPhase::Scavenging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcPhase {
    /// Mutators are allocating.
    #[default]
    Idle,
    /// Live objects are being copied out of the space.
    Scavenging,
    /// Live objects are being marked.
    Marking,
    /// Dead objects are being swept into the free list.
    Sweeping,
}

/// State every space kind carries.
#[derive(Debug)]
pub struct SpaceCore {
    pub(crate) metadata: Arc<GcMetadata>,
    pub(crate) chunks: Vec<Chunk>,
    pub(crate) used: usize,
    pub(crate) top: Address,
    pub(crate) limit: Address,
    pub(crate) allocation_budget: isize,
    pub(crate) no_allocation_failure_nesting: usize,
    pub(crate) resizeable: bool,
    pub(crate) phase: GcPhase,
    name: &'static str,
}

impl SpaceCore {
    pub(crate) fn new(metadata: Arc<GcMetadata>, resizeable: bool, name: &'static str) -> Self {
        SpaceCore {
            metadata,
            chunks: Vec::new(),
            used: 0,
            top: Address::NULL,
            limit: Address::NULL,
            allocation_budget: 0,
            no_allocation_failure_nesting: 0,
            resizeable,
            phase: GcPhase::Idle,
            name,
        }
    }

    /// Name used in log events.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Gets a fresh chunk of at least `size` bytes from the page source.
    pub(crate) fn allocate_chunk(&self, size: usize) -> Option<Chunk> {
        let chunk = Chunk::allocate(&self.metadata, size)?;
        log_chunk_allocated(self.name, chunk.start(), chunk.size());
        Some(chunk)
    }

    pub(crate) fn last_chunk(&self) -> Option<&Chunk> {
        self.chunks.last()
    }
}

impl Drop for SpaceCore {
    fn drop(&mut self) {
        for chunk in std::mem::take(&mut self.chunks) {
            chunk.release(&self.metadata);
        }
    }
}

/// Operations common to both space kinds.
pub trait Space {
    fn core(&self) -> &SpaceCore;

    fn core_mut(&mut self) -> &mut SpaceCore;

    /// Bytes currently occupied by objects.
    fn used(&self) -> usize;

    /// Brings the active allocation area into a parseable state.
    fn flush(&mut self);

    fn metadata(&self) -> &Arc<GcMetadata> {
        &self.core().metadata
    }

    fn chunks(&self) -> &[Chunk] {
        &self.core().chunks
    }

    /// Total bytes of all chunks.
    fn size(&self) -> usize {
        self.chunks().iter().map(Chunk::size).sum()
    }

    fn is_empty(&self) -> bool {
        self.chunks().is_empty()
    }

    fn is_resizeable(&self) -> bool {
        self.core().resizeable
    }

    /// Returns true if `address` lies in one of this space's chunks.
    fn includes(&self, address: Address) -> bool {
        self.chunks().iter().any(|chunk| chunk.includes(address))
    }

    fn phase(&self) -> GcPhase {
        self.core().phase
    }

    fn set_phase(&mut self, phase: GcPhase) {
        self.core_mut().phase = phase;
    }

    fn set_used(&mut self, used: usize) {
        self.core_mut().used = used;
    }

    fn allocation_budget(&self) -> isize {
        self.core().allocation_budget
    }

    /// Sets the budget, never below the default chunk size for `budget`.
    fn set_allocation_budget(&mut self, budget: isize) {
        let floor = default_chunk_size(budget.max(0) as usize) as isize;
        self.core_mut().allocation_budget = budget.max(floor);
    }

    /// Recomputes the budget from what is used here plus `used_outside`.
    fn adjust_allocation_budget(&mut self, used_outside: usize) {
        let used = self.used() + used_outside;
        self.core_mut().allocation_budget = default_chunk_size(used).max(used) as isize;
    }

    fn increase_allocation_budget(&mut self, size: usize) {
        self.core_mut().allocation_budget += size as isize;
    }

    fn decrease_allocation_budget(&mut self, size: usize) {
        self.core_mut().allocation_budget -= size as isize;
    }

    fn needs_garbage_collection(&self) -> bool {
        self.core().allocation_budget <= 0 || !self.core().resizeable
    }

    fn in_no_allocation_failure_scope(&self) -> bool {
        self.core().no_allocation_failure_nesting != 0
    }

    /// Visits every object in address order, chunk by chunk.
    fn iterate_objects(&mut self, visitor: &mut dyn HeapObjectVisitor) {
        self.flush();
        for chunk in self.chunks() {
            let mut current = chunk.start();
            while !has_sentinel_at(current) {
                let object = HeapObject::from_address(current);
                current = current + visitor.visit(object);
            }
            visitor.chunk_end(current);
        }
    }

    /// Offset of `object` from the start of a single-chunk space.
    fn offset_of(&self, object: HeapObject) -> usize {
        let chunks = self.chunks();
        debug_assert_eq!(chunks.len(), 1);
        object.address() - chunks[0].start()
    }

    /// Inverse of [`Space::offset_of`].
    fn object_at_offset(&self, offset: usize) -> HeapObject {
        let chunks = self.chunks();
        debug_assert_eq!(chunks.len(), 1);
        HeapObject::from_address(chunks[0].start() + offset)
    }
}

/// A space a collection just reclaimed, queried for survivors.
pub trait Reclaimed: Space {
    /// Whether `object`, which lies in this space, survived.
    fn is_alive(&self, object: HeapObject) -> bool;

    /// Where a surviving `object` lives now.
    fn new_location(&self, object: HeapObject) -> HeapObject;
}

/// Guard under which a space grows instead of asking for a collection.
///
/// Used while copying survivors: a scavenge cannot itself collect.
pub struct NoAllocationFailureScope<'a, S: Space + ?Sized> {
    space: &'a mut S,
}

impl<'a, S: Space + ?Sized> NoAllocationFailureScope<'a, S> {
    pub fn new(space: &'a mut S) -> Self {
        debug_assert!(space.is_resizeable());
        space.core_mut().no_allocation_failure_nesting += 1;
        NoAllocationFailureScope { space }
    }
}

impl<S: Space + ?Sized> Deref for NoAllocationFailureScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.space
    }
}

impl<S: Space + ?Sized> DerefMut for NoAllocationFailureScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.space
    }
}

impl<S: Space + ?Sized> Drop for NoAllocationFailureScope<'_, S> {
    fn drop(&mut self) {
        self.space.core_mut().no_allocation_failure_nesting -= 1;
    }
}
