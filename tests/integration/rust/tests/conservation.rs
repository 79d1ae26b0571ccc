//! Heap accounting integration tests
//!
//! Walking a space must account for every byte of its chunks, and the live
//! part of that walk must agree with the space's own `used` figure.

use core_types::{Object, WORD_SIZE};
use integration_tests::{build_list, test_metadata, ClassSlots, Roots};
use object_memory::{
    HeapConfig, HeapObject, HeapObjectVisitor, ManagedHeap, ObjectAllocator, Space, TwoSpaceHeap,
};
use page_allocator::PAGE_SIZE;

#[derive(Default)]
struct Walk {
    total: usize,
    live: usize,
    structure: usize,
}

impl HeapObjectVisitor for Walk {
    fn visit(&mut self, object: HeapObject) -> usize {
        let size = object.size();
        self.total += size;
        if object.object_type().is_heap_structure() {
            self.structure += size;
        } else {
            self.live += size;
        }
        size
    }
}

fn walk<S: Space>(space: &mut S) -> Walk {
    let mut walk = Walk::default();
    space.iterate_objects(&mut walk);
    walk
}

fn chunk_capacity<S: Space>(space: &S) -> usize {
    space
        .chunks()
        .iter()
        .map(|chunk| chunk.size() - WORD_SIZE)
        .sum()
}

/// Churns a heap: two lists, one dropped, plus a few arrays.
fn churn(heap: &mut TwoSpaceHeap, roots: &mut Roots, classes: ClassSlots) {
    let kept = roots.push(Object::ZERO);
    let dropped = roots.push(Object::ZERO);
    build_list(heap, roots, classes, kept, 3_000);
    build_list(heap, roots, classes, dropped, 3_000);
    for length in [5, 40, 300] {
        let array = heap
            .create_array(classes.array(roots), length, Object::from_smi(1))
            .expect("array");
        roots.push(array.as_object());
    }
    heap.old_space_mut().set_allocation_budget(1 << 30);
    heap.collect_new_space(roots);
    heap.collect_new_space(roots);
    roots.set(dropped, Object::ZERO);
}

/// Test: after a sweep the old space is exactly live objects plus fillers
#[test]
fn test_swept_old_space_is_fully_accounted() {
    let config = HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE);
    let mut heap = TwoSpaceHeap::new(test_metadata(), config);
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    churn(&mut heap, &mut roots, classes);

    heap.collect_old_space(&mut roots);
    let old = heap.old_space_mut();
    let walked = walk(old);
    assert_eq!(walked.total, chunk_capacity(old));
    assert_eq!(walked.live, old.used());
    assert!(walked.structure > 0, "the dropped list left free memory");
    assert!(walked.structure >= old.free_list().total_free());
}

/// Test: new space is exactly its objects, before and after a scavenge
#[test]
fn test_new_space_walk_matches_used() {
    let config = HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE);
    let mut heap = TwoSpaceHeap::new(test_metadata(), config);
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let head = roots.push(Object::ZERO);
    build_list(&mut heap, &mut roots, classes, head, 200);

    heap.flush();
    let mut census = Walk::default();
    heap.iterate_objects(&mut census);
    assert_eq!(census.structure, 0);
    assert_eq!(census.live, heap.new_space().used() + heap.old_space().used());

    heap.collect_new_space(&mut roots);
    heap.flush();
    let mut census = Walk::default();
    heap.iterate_objects(&mut census);
    assert_eq!(census.live, heap.new_space().used());
    assert_eq!(heap.old_space().used(), 0);
}

/// Test: repeated full collections keep the accounting exact
#[test]
fn test_accounting_holds_across_cycles() {
    let config = HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE);
    let mut heap = TwoSpaceHeap::new(test_metadata(), config);
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);

    for _ in 0..3 {
        churn(&mut heap, &mut roots, classes);
        heap.collect_old_space(&mut roots);
        let old = heap.old_space_mut();
        let walked = walk(old);
        assert_eq!(walked.total, chunk_capacity(old));
        assert_eq!(walked.live, old.used());
    }
    assert!(heap.stats().mark_sweeps >= 3);
}
