//! Sweeping of the mark-sweep space.

use crate::free_list::FreeList;
use crate::gc_metadata::GcMetadata;
use crate::object::HeapObject;
use crate::visitor::HeapObjectVisitor;
use core_types::Address;

/// Turns every run of unmarked objects into one free chunk and unmarks the
/// survivors.
///
/// Runs are only written into the free list once the walk is over: a dead
/// object's class may itself be dead, and must stay readable until every
/// object using it has been sized.
pub struct SweepingVisitor<'a> {
    free_list: &'a mut FreeList,
    metadata: &'a GcMetadata,
    free_start: Address,
    free_runs: Vec<(Address, usize)>,
    used: usize,
}

impl<'a> SweepingVisitor<'a> {
    /// Starts a sweep; the free list is rebuilt from scratch.
    pub fn new(free_list: &'a mut FreeList, metadata: &'a GcMetadata) -> Self {
        free_list.clear();
        SweepingVisitor {
            free_list,
            metadata,
            free_start: Address::NULL,
            free_runs: Vec::new(),
            used: 0,
        }
    }

    fn end_free_run(&mut self, end: Address) {
        if !self.free_start.is_null() {
            self.free_runs.push((self.free_start, end - self.free_start));
            self.free_start = Address::NULL;
        }
    }

    /// Live bytes seen so far.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Hands the collected runs to the free list and returns the live bytes.
    pub fn finish(self) -> usize {
        for (start, size) in self.free_runs {
            self.free_list.add_chunk(start, size);
        }
        self.used
    }
}

impl HeapObjectVisitor for SweepingVisitor<'_> {
    fn visit(&mut self, object: HeapObject) -> usize {
        let size = object.size();
        let address = object.address();
        if object.is_marked(self.metadata) {
            self.end_free_run(address);
            self.metadata.record_start(address);
            self.metadata.clear_mark(address, size);
            self.used += size;
        } else if self.free_start.is_null() {
            self.free_start = address;
        }
        size
    }

    fn chunk_end(&mut self, end: Address) {
        self.end_free_run(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataConfig;
    use crate::kinds::FreeListChunk;
    use crate::old_space::OldSpace;
    use crate::space::Space;
    use core_types::WORD_SIZE;
    use page_allocator::PAGE_SIZE;
    use std::sync::Arc;

    const W: usize = WORD_SIZE;

    #[test]
    fn test_sweep_coalesces_dead_runs() {
        let metadata =
            Arc::new(GcMetadata::setup(&MetadataConfig::default().with_arena_size(4 << 20)).unwrap());
        let mut space = OldSpace::new(Arc::clone(&metadata));
        space.set_allocation_budget(8 * PAGE_SIZE as isize);
        let objects: Vec<HeapObject> = (0..6)
            .map(|_| {
                let address = space.allocate(4 * W).unwrap();
                FreeListChunk::create(address, 4 * W);
                HeapObject::from_address(address)
            })
            .collect();
        // Keep 0 and 3; 1-2 and 4-5 are dead.
        objects[0].set_mark(&metadata);
        objects[3].set_mark(&metadata);

        let chunk_payload = space.chunks()[0].size() - W;
        let used = space.sweep();
        assert_eq!(used, 8 * W);
        assert!(!objects[0].is_marked(&metadata));
        // One run between the survivors, one from object 4 to the chunk end.
        assert_eq!(space.free_list().chunk_count(), 2);
        assert_eq!(space.free_list().total_free(), chunk_payload - used);
    }
}
