//! Bump-only copying space.

use crate::chunk::Chunk;
use crate::gc_metadata::GcMetadata;
use crate::object::{HeapObject, RawAllocator};
use crate::scavenge::{Record, ScavengeScan};
use crate::space::{
    default_chunk_size, has_sentinel_at, write_sentinel_at, Reclaimed, Space, SpaceCore,
    DEFAULT_MAX_CHUNK_SIZE, SENTINEL_SIZE,
};
use core_types::{fatal, round_up, Address, FatalError, WORD_SIZE};
use page_allocator::PAGE_SIZE;
use std::sync::Arc;

/// A copying space: objects are bump allocated and never freed one by one.
/// A scavenge copies the survivors into a fresh semi-space and drops the
/// old one as a whole.
#[derive(Debug)]
pub struct SemiSpace {
    core: SpaceCore,
    water_mark: Address,
}

impl SemiSpace {
    /// Creates a semi-space.
    ///
    /// A non-zero `maximum_initial_size` gets a first chunk right away; a
    /// resizeable space caps it at the default maximum chunk size.
    ///
    /// # Panics
    ///
    /// Panics (fatally) if the page source cannot supply the first chunk.
    pub fn new(metadata: Arc<GcMetadata>, resizeable: bool, maximum_initial_size: usize) -> Self {
        let mut space = SemiSpace {
            core: SpaceCore::new(metadata, resizeable, "semi_space"),
            water_mark: Address::NULL,
        };
        if maximum_initial_size > 0 {
            let mut size = round_up(maximum_initial_size, PAGE_SIZE);
            if resizeable {
                size = size.min(DEFAULT_MAX_CHUNK_SIZE);
            }
            match space.core.allocate_chunk(size) {
                Some(chunk) => space.append(chunk),
                None => fatal(FatalError::ChunkAllocationFailed { size }),
            }
            space.water_mark = space.core.top;
        }
        space
    }

    fn append(&mut self, chunk: Chunk) {
        if let Some(last) = self.core.last_chunk() {
            self.core.used += self.core.top - last.start();
        }
        let start = chunk.start();
        self.core.chunks.push(chunk);
        self.update_base_and_limit(start);
    }

    fn update_base_and_limit(&mut self, top: Address) {
        let Some(chunk) = self.core.last_chunk() else {
            return;
        };
        let (start, end) = (chunk.start(), chunk.end());
        debug_assert!(start <= top && top < end);
        self.core.top = top;
        self.core.limit = end;
        write_sentinel_at(top);
        if top == start && self.core.metadata.in_metadata_range(start) {
            self.core.metadata.initialize_starts_for_chunk(start, end);
        }
    }

    /// Bump allocates in the current chunk, leaving room for the sentinel.
    pub fn try_allocate(&mut self, size: usize) -> Option<Address> {
        let new_top = self.core.top + size;
        if new_top < self.core.limit {
            let result = self.core.top;
            self.core.top = new_top;
            write_sentinel_at(new_top);
            return Some(result);
        }
        if !self.is_empty() {
            self.flush();
        }
        None
    }

    fn allocate_in_new_chunk(&mut self, size: usize) -> Option<Address> {
        let default_size = default_chunk_size(self.used());
        let chunk_size = if size >= default_size {
            size + SENTINEL_SIZE
        } else {
            default_size
        };
        let chunk = self.core.allocate_chunk(chunk_size)?;
        self.core.allocation_budget -= chunk.size() as isize;
        self.append(chunk);
        self.try_allocate(size)
    }

    /// Allocates `size` bytes.
    ///
    /// Returns `None` when the space wants a collection first, unless it is
    /// inside a [`NoAllocationFailureScope`](crate::space::NoAllocationFailureScope).
    pub fn allocate(&mut self, size: usize) -> Option<Address> {
        debug_assert!(size >= HeapObject::SIZE && size % WORD_SIZE == 0);
        if let Some(result) = self.try_allocate(size) {
            return Some(result);
        }
        if !self.in_no_allocation_failure_scope() && self.needs_garbage_collection() {
            return None;
        }
        self.allocate_in_new_chunk(size)
    }

    /// Gives back the most recent allocation if `object` is it.
    pub fn try_dealloc(&mut self, object: HeapObject, size: usize) -> bool {
        if self.core.top != object.address() + size {
            return false;
        }
        self.core.top = object.address();
        self.core.allocation_budget += size as isize;
        write_sentinel_at(self.core.top);
        true
    }

    /// True when the sentinel sits at the allocation top.
    pub fn is_flushed(&self) -> bool {
        if self.core.top.is_null() && self.core.limit.is_null() {
            return true;
        }
        has_sentinel_at(self.core.top)
    }

    /// Makes the next allocation fail so a collection happens soon.
    pub fn trigger_gc_soon(&mut self) {
        self.core.limit = self.core.top + WORD_SIZE;
    }

    /// Current allocation top.
    pub fn top(&self) -> Address {
        self.core.top
    }

    /// Objects below the water mark have survived a scavenge already.
    pub fn water_mark(&self) -> Address {
        self.water_mark
    }

    pub fn set_water_mark(&mut self, water_mark: Address) {
        self.water_mark = water_mark;
    }

    /// Empties the space for reuse as a scavenge destination, keeping only
    /// the first chunk.
    pub(crate) fn reset(&mut self) {
        if self.core.chunks.len() > 1 {
            for chunk in self.core.chunks.drain(1..) {
                chunk.release(&self.core.metadata);
            }
        }
        self.core.used = 0;
        if let Some(chunk) = self.core.chunks.first_mut() {
            let start = chunk.start();
            chunk.set_scavenge_pointer(start);
            self.update_base_and_limit(start);
        }
        self.water_mark = self.core.top;
    }

    /// Scans the space from the start of each chunk until no unscanned
    /// copies are left.
    pub fn complete_scavenge<V: ScavengeScan + ?Sized>(visitor: &mut V) {
        visitor.to_space().flush();
        let mut index = 0;
        while index < visitor.to_space().chunks().len() {
            let mut current = visitor.to_space().chunks()[index].start();
            while !has_sentinel_at(current) {
                let object = HeapObject::from_address(current);
                let size = object.size();
                object.iterate_pointers(visitor);
                current = current + size;
            }
            index += 1;
        }
    }

    /// Scans copies made since the previous call, chunk by chunk from each
    /// chunk's scavenge pointer. Returns true if anything was scanned.
    pub fn complete_scavenge_generational<V: ScavengeScan + ?Sized>(visitor: &mut V) -> bool {
        let mut found_work = false;
        visitor.set_record(Record::Dummy);
        visitor.to_space().flush();
        let mut index = 0;
        while index < visitor.to_space().chunks().len() {
            let mut current = visitor.to_space().chunks()[index].scavenge_pointer();
            while !has_sentinel_at(current) {
                found_work = true;
                let object = HeapObject::from_address(current);
                let size = object.size();
                object.iterate_pointers(visitor);
                current = current + size;
            }
            visitor.to_space().core.chunks[index].set_scavenge_pointer(current);
            index += 1;
        }
        found_work
    }
}

impl Space for SemiSpace {
    fn core(&self) -> &SpaceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SpaceCore {
        &mut self.core
    }

    fn used(&self) -> usize {
        match self.core.last_chunk() {
            Some(last) => self.core.used + (self.core.top - last.start()),
            None => self.core.used,
        }
    }

    fn flush(&mut self) {
        if !self.is_empty() {
            write_sentinel_at(self.core.top);
        }
    }
}

impl Reclaimed for SemiSpace {
    fn is_alive(&self, object: HeapObject) -> bool {
        debug_assert!(self.includes(object.address()));
        object.has_forwarding_address()
    }

    fn new_location(&self, object: HeapObject) -> HeapObject {
        debug_assert!(self.is_alive(object));
        object.forwarding_address().unwrap_or(object)
    }
}

impl RawAllocator for SemiSpace {
    fn allocate_raw(&mut self, size: usize) -> Option<Address> {
        self.allocate(size)
    }
}
