//! Non-moving, free-list backed space for long-lived objects.

use crate::error::VerifyError;
use crate::format::ObjectType;
use crate::free_list::FreeList;
use crate::gc_metadata::{GcMetadata, CARD_SIZE, NO_OBJECT_START};
use crate::kinds::PromotedTrack;
use crate::object::{HeapObject, RawAllocator};
use crate::scavenge::{PromotionScan, Record};
use crate::semi_space::SemiSpace;
use crate::space::{
    default_chunk_size, has_sentinel_at, write_sentinel_at, Reclaimed, Space, SpaceCore,
    SENTINEL_SIZE,
};
use crate::sweeper::SweepingVisitor;
use core_types::{round_down, Address, WORD_SIZE};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::trace;

/// The mark-sweep space.
///
/// Allocation bumps through the current area, then takes chunks from the
/// free list, then grows by a new chunk. While tracking is on (during a
/// generational scavenge) every new area starts with a [`PromotedTrack`]
/// header so the promoted objects in it can be scanned later.
#[derive(Debug)]
pub struct OldSpace {
    core: SpaceCore,
    free_list: FreeList,
    tracking_allocations: bool,
    promoted_track: Option<PromotedTrack>,
}

impl OldSpace {
    pub fn new(metadata: Arc<GcMetadata>) -> Self {
        OldSpace {
            core: SpaceCore::new(metadata, true, "old_space"),
            free_list: FreeList::new(),
            tracking_allocations: false,
            promoted_track: None,
        }
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    pub fn is_tracking_allocations(&self) -> bool {
        self.tracking_allocations
    }

    fn bump(&mut self, size: usize) -> Option<Address> {
        if self.core.limit - self.core.top < size {
            return None;
        }
        let result = self.core.top;
        self.core.top = result + size;
        self.core.allocation_budget -= size as isize;
        self.core.metadata.record_start(result);
        Some(result)
    }

    fn start_promoted_track(&mut self) {
        let track = PromotedTrack::initialize(self.promoted_track, self.core.top, self.core.limit);
        self.promoted_track = Some(track);
        self.core.top = self.core.top + PromotedTrack::HEADER_SIZE;
    }

    fn use_whole_chunk(&mut self, index: usize) {
        let chunk = &self.core.chunks[index];
        let (start, size) = (chunk.start(), chunk.size());
        self.core.top = start;
        self.core.limit = start + size - SENTINEL_SIZE;
        write_sentinel_at(self.core.limit);
        if self.tracking_allocations {
            self.start_promoted_track();
        }
        self.core.used += size - SENTINEL_SIZE;
    }

    fn allocate_and_use_chunk(&mut self, size: usize) -> bool {
        let Some(chunk) = self.core.allocate_chunk(size) else {
            return false;
        };
        let (start, end) = (chunk.start(), chunk.end());
        let metadata = &self.core.metadata;
        metadata.initialize_starts_for_chunk(start, end);
        metadata.initialize_remembered_set_for_chunk(start, end);
        metadata.clear_mark_bits_for(start, end);
        self.flush();
        self.core.chunks.push(chunk);
        self.use_whole_chunk(self.core.chunks.len() - 1);
        true
    }

    fn allocate_in_new_chunk(&mut self, size: usize) -> Option<Address> {
        let tracking_size = if self.tracking_allocations {
            PromotedTrack::HEADER_SIZE
        } else {
            0
        };
        let needed = size + tracking_size + SENTINEL_SIZE;
        let chunk_size = needed.max(default_chunk_size(self.used()));
        if self.allocate_and_use_chunk(chunk_size) {
            return self.bump(size);
        }
        self.core.allocation_budget = -1;
        None
    }

    fn allocate_from_free_list(&mut self, size: usize) -> Option<Address> {
        self.flush();
        let request = if self.tracking_allocations {
            size + PromotedTrack::HEADER_SIZE
        } else {
            size
        };
        let chunk = self.free_list.get_chunk(request)?;
        self.core.top = chunk.address();
        self.core.limit = self.core.top + chunk.size();
        self.core.used += chunk.size();
        if self.tracking_allocations {
            self.start_promoted_track();
        }
        self.bump(size)
    }

    /// Allocates `size` bytes.
    ///
    /// Returns `None` when a collection is due (outside a
    /// [`NoAllocationFailureScope`](crate::space::NoAllocationFailureScope))
    /// or when neither the free list nor the page source can satisfy the
    /// request; the latter also exhausts the budget.
    pub fn allocate(&mut self, size: usize) -> Option<Address> {
        debug_assert!(size >= HeapObject::SIZE && size % WORD_SIZE == 0);
        if let Some(result) = self.bump(size) {
            return Some(result);
        }
        if !self.in_no_allocation_failure_scope() && self.needs_garbage_collection() {
            return None;
        }
        let result = self
            .allocate_from_free_list(size)
            .or_else(|| self.allocate_in_new_chunk(size));
        if result.is_none() {
            self.core.allocation_budget = 0;
        }
        result
    }

    /// Starts a header-prefixed area for every allocation until
    /// [`OldSpace::end_tracking_allocations`].
    pub fn start_tracking_allocations(&mut self) {
        self.flush();
        debug_assert!(!self.tracking_allocations);
        debug_assert!(self.promoted_track.is_none());
        self.tracking_allocations = true;
    }

    pub fn end_tracking_allocations(&mut self) {
        debug_assert!(self.tracking_allocations);
        debug_assert!(self.promoted_track.is_none());
        self.tracking_allocations = false;
    }

    /// Turns every outstanding promoted track back into ordinary heap.
    pub fn unlink_promoted_track(&mut self) {
        self.flush();
        let mut track = self.promoted_track.take();
        while let Some(current) = track {
            track = current.next();
            current.zap();
        }
    }

    /// Scans the objects promoted since the previous call, each with its own
    /// card as the remembered-set record. Returns true if any promoted memory
    /// was found.
    pub fn complete_scavenge_generational<V: PromotionScan + ?Sized>(visitor: &mut V) -> bool {
        let old_space = visitor.old_space();
        old_space.flush();
        let mut track = old_space.promoted_track.take();
        let mut found_work = false;
        while let Some(current_track) = track {
            let (start, end) = (current_track.start(), current_track.end());
            if start != end {
                found_work = true;
            }
            let mut current = start;
            while current < end {
                let object = HeapObject::from_address(current);
                let size = object.size();
                visitor.set_record(Record::Card(current));
                object.iterate_pointers(visitor);
                current = current + size;
            }
            track = current_track.next();
            current_track.zap();
        }
        found_work
    }

    /// Visits every old object that may point into new space.
    ///
    /// Walks every chunk rather than only dirty cards: the cards are reset
    /// and re-dirtied by the visitor for each object found to still point
    /// into new space. Promoted tracks are skipped; their contents are
    /// scanned by [`OldSpace::complete_scavenge_generational`].
    pub fn visit_remembered_set<V: PromotionScan + ?Sized>(visitor: &mut V) {
        let old_space = visitor.old_space();
        old_space.flush();
        let chunks = old_space.chunks().len();
        for index in 0..chunks {
            let old_space = visitor.old_space();
            let chunk = &old_space.chunks()[index];
            let (start, end) = (chunk.start(), chunk.end());
            old_space
                .metadata()
                .initialize_remembered_set_for_chunk(start, end);
            let mut current = start;
            while !has_sentinel_at(current) {
                let object = HeapObject::from_address(current);
                let size = object.size();
                if object.object_type() != ObjectType::PromotedTrack {
                    visitor.set_record(Record::Card(current));
                    object.iterate_pointers(visitor);
                }
                current = current + size;
            }
        }
    }

    /// Clears the mark bits of every chunk.
    pub fn clear_mark_bits(&mut self) {
        for chunk in &self.core.chunks {
            self.core
                .metadata
                .clear_mark_bits_for(chunk.start(), chunk.end());
        }
    }

    /// Sweeps unmarked objects into the free list and returns the live
    /// bytes. Object starts are rebuilt from the survivors.
    pub fn sweep(&mut self) -> usize {
        self.flush();
        for chunk in &self.core.chunks {
            self.core
                .metadata
                .initialize_starts_for_chunk(chunk.start(), chunk.end());
        }
        let metadata = Arc::clone(&self.core.metadata);
        let mut free_list = std::mem::take(&mut self.free_list);
        let used = {
            let mut sweeper = SweepingVisitor::new(&mut free_list, &metadata);
            self.iterate_objects(&mut sweeper);
            sweeper.finish()
        };
        self.free_list = free_list;
        self.core.used = used;
        trace!(
            space = self.core.name(),
            used,
            free_chunks = self.free_list.chunk_count(),
            "swept"
        );
        used
    }

    /// Checks the object-start table and the remembered set against a
    /// linear walk of the space.
    pub fn verify(&mut self, new_space: &SemiSpace) -> Result<(), VerifyError> {
        self.flush();
        let metadata = Arc::clone(&self.core.metadata);
        for chunk in &self.core.chunks {
            let mut starts = HashSet::new();
            let mut current = chunk.start();
            while !has_sentinel_at(current) {
                let object = HeapObject::from_address(current);
                starts.insert(current);
                if object.contains_pointers_to(new_space) && !metadata.is_marked_dirty(current) {
                    return Err(VerifyError::MissingRememberedSetEntry { object: current });
                }
                current = current + object.size();
            }

            let mut card = chunk.start();
            while card < chunk.end() {
                let entry = metadata.starts_for(card).load(Ordering::Relaxed);
                if entry != NO_OBJECT_START {
                    let object = Address::new(round_down(card.raw(), 256) | entry as usize);
                    if round_down(object.raw(), CARD_SIZE) != card.raw() || !starts.contains(&object)
                    {
                        return Err(VerifyError::BadObjectStart { card });
                    }
                }
                card = card + CARD_SIZE;
            }
        }
        Ok(())
    }
}

impl Space for OldSpace {
    fn core(&self) -> &SpaceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SpaceCore {
        &mut self.core
    }

    fn used(&self) -> usize {
        self.core.used
    }

    /// Returns the rest of the current area to the free list.
    fn flush(&mut self) {
        if self.core.top.is_null() {
            return;
        }
        let free = self.core.limit - self.core.top;
        self.free_list.add_chunk(self.core.top, free);
        if self.tracking_allocations {
            if let Some(track) = self.promoted_track {
                track.set_end(self.core.top);
            }
        }
        self.core.top = Address::NULL;
        self.core.limit = Address::NULL;
        self.core.used -= free;
    }
}

impl Reclaimed for OldSpace {
    fn is_alive(&self, object: HeapObject) -> bool {
        object.is_marked(&self.core.metadata)
    }

    fn new_location(&self, object: HeapObject) -> HeapObject {
        object
    }
}

impl RawAllocator for OldSpace {
    fn allocate_raw(&mut self, size: usize) -> Option<Address> {
        self.allocate(size)
    }
}
