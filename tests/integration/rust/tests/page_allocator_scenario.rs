//! Page allocator and GC metadata integration tests
//!
//! The metadata owns the page allocator; spaces draw their chunks from it
//! and give them back when collected or dropped.

use core_types::{Object, WORD_SIZE};
use integration_tests::{ClassSlots, Roots};
use object_memory::{
    AllocError, GcMetadata, HeapConfig, ManagedHeap, MetadataConfig, ObjectAllocator, Space,
    TwoSpaceHeap,
};
use page_allocator::PAGE_SIZE;
use std::sync::Arc;

/// Test: pages come from the heap arena, never overlap and are reusable
#[test]
fn test_metadata_pages_stay_inside_heap_arena() {
    let config = MetadataConfig::default().with_arena_sizes(vec![256 * PAGE_SIZE, 64 * PAGE_SIZE]);
    let metadata = GcMetadata::setup(&config).expect("setup");
    assert!(metadata.heap_extent() >= 256 * PAGE_SIZE);

    let mut runs = Vec::new();
    while let Some(run) = metadata.allocate_pages(8) {
        assert!(metadata.in_metadata_range(run));
        assert!(metadata.in_metadata_range(run + (8 * PAGE_SIZE - 1)));
        runs.push(run);
    }
    assert!(runs.len() >= 256 / 8 - 2, "only {} runs", runs.len());

    runs.sort();
    for pair in runs.windows(2) {
        assert!(pair[1] - pair[0] >= 8 * PAGE_SIZE, "runs overlap");
    }

    for &run in &runs {
        metadata.free_pages(run, 8);
    }
    let again = metadata.allocate_pages(8).expect("pages after free");
    assert!(runs.contains(&again));
}

/// Test: exhausting the page source is a retryable failure, and a
/// collection makes the memory usable again
#[test]
fn test_old_space_exhaustion_recovers_after_collection() {
    let metadata = Arc::new(
        GcMetadata::setup(&MetadataConfig::default().with_arena_size(1 << 20)).expect("setup"),
    );
    let config = HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE);
    let mut heap = TwoSpaceHeap::new(metadata, config);
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    heap.old_space_mut().set_allocation_budget(1 << 30);

    let length = (12 * PAGE_SIZE) / WORD_SIZE - 3;
    let mut arrays = 0;
    let error = loop {
        match heap.create_array(classes.array(&roots), length, Object::ZERO) {
            Ok(_) => arrays += 1,
            Err(error) => break error,
        }
    };
    assert!(matches!(error, AllocError::RetryAfterGc { .. }));
    assert!(arrays >= 2, "only {arrays} arrays fit");
    let old_size = heap.old_space().size();

    heap.collect_old_space(&mut roots);
    assert_eq!(heap.stats().mark_sweeps, 1);
    heap.old_space_mut().set_allocation_budget(1 << 30);
    for _ in 1..arrays {
        heap.create_array(classes.array(&roots), length, Object::ZERO)
            .expect("array after collection");
    }
    assert_eq!(heap.old_space().size(), old_size);
}
