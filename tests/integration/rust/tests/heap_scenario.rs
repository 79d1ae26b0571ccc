//! Single-space heap scenarios
//!
//! A program-like workload on [`Heap`]: build object graphs larger than the
//! allocation budget, collect repeatedly, and check nothing reachable is
//! lost or corrupted.

use core_types::Object;
use integration_tests::{
    allocate_with_retry, build_list, list_values, test_metadata, ClassSlots, Roots,
};
use object_memory::{
    Array, Heap, HeapConfig, HeapObject, HeapObjectVisitor, ManagedHeap, ObjectAllocator, Space,
    Str,
};

fn heap() -> Heap {
    Heap::new(test_metadata(), &HeapConfig::default())
}

/// Test: a long list survives the collections its own allocation triggers
#[test]
fn test_list_survives_triggered_collections() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let head = roots.push(Object::ZERO);

    build_list(&mut heap, &mut roots, classes, head, 5000);

    assert!(heap.stats().scavenges > 0, "the budget should force collections");
    let values = list_values(roots.value(head));
    let expected: Vec<isize> = (0..5000).rev().collect();
    assert_eq!(values, expected);
}

/// Test: garbage disappears and only the rooted objects remain
#[test]
fn test_collection_keeps_exactly_the_reachable_objects() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let garbage = roots.push(Object::ZERO);
    build_list(&mut heap, &mut roots, classes, garbage, 200);
    roots.set(garbage, Object::ZERO);

    heap.collect_garbage(&mut roots);

    struct Census(usize, usize);
    impl HeapObjectVisitor for Census {
        fn visit(&mut self, object: HeapObject) -> usize {
            self.0 += 1;
            self.1 += object.size();
            object.size()
        }
    }
    let mut census = Census(0, 0);
    heap.iterate_objects(&mut census);
    // The meta class plus four classes.
    assert_eq!(census.0, 5);
    assert_eq!(census.1, heap.used());
}

/// Test: contents of every kind survive being moved
#[test]
fn test_contents_survive_moves() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);

    let units: Vec<u16> = "scavenged".encode_utf16().collect();
    let string = heap
        .create_string(classes.string(&roots), &units)
        .expect("string");
    let string_slot = roots.push(string.as_object());
    let array = heap
        .create_array(classes.array(&roots), 3, Object::from_smi(-1))
        .expect("array");
    array.set(1, string.as_object());
    let array_slot = roots.push(array.as_object());

    for _ in 0..3 {
        heap.collect_garbage(&mut roots);
    }

    let array = Array::cast(roots.get(array_slot));
    let string = Str::cast(roots.get(string_slot));
    assert!(heap.space().includes(array.address()));
    assert_eq!(array.get(0), Object::from_smi(-1));
    assert_eq!(array.get(1), string.as_object());
    assert_eq!(string.to_string_lossy(), "scavenged");
    assert_eq!(heap.stats().scavenges, 3);
}

/// Test: identity hashes of immutable instances survive moves
#[test]
fn test_identity_hash_is_stable() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let instance = allocate_with_retry(&mut heap, &mut roots, |heap, roots| {
        heap.create_instance(classes.pair(roots), Object::ZERO, true)
    });
    let hash = instance.identity_hash();
    let slot = roots.push(instance.as_object());

    heap.collect_garbage(&mut roots);
    let moved = object_memory::Instance::cast(roots.get(slot));
    assert_ne!(moved.address(), instance.address());
    assert_eq!(moved.identity_hash(), hash);
    assert!(moved.immutable());
}

/// Test: foreign memory pressure brings the next collection forward
#[test]
fn test_foreign_memory_forces_collection() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    heap.allocated_foreign_memory(1 << 20);

    let error = loop {
        if let Err(error) = heap.create_instance(classes.pair(&roots), Object::ZERO, false) {
            break error;
        }
    };
    assert!(error.is_retry_after_gc());
    heap.freed_foreign_memory(1 << 20);
    heap.collect_garbage(&mut roots);
    assert!(heap.create_instance(classes.pair(&roots), Object::ZERO, false).is_ok());
}
