//! Generational heap integration tests
//!
//! Tests how new space, old space, the remembered set and both collectors
//! cooperate inside [`TwoSpaceHeap`].

use core_types::Object;
use integration_tests::{build_list, list_values, test_metadata, ClassSlots, Roots};
use object_memory::{HeapConfig, HeapObject, Instance, ManagedHeap, ObjectAllocator, Space, TwoSpaceHeap};
use page_allocator::PAGE_SIZE;

fn heap() -> TwoSpaceHeap {
    TwoSpaceHeap::new(test_metadata(), HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE))
}

/// Test: a list much larger than new space ends up promoted, intact
#[test]
fn test_long_lived_list_is_promoted() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let head = roots.push(Object::ZERO);

    build_list(&mut heap, &mut roots, classes, head, 10_000);
    heap.old_space_mut().set_allocation_budget(1 << 30);
    heap.collect_new_space(&mut roots);
    heap.collect_new_space(&mut roots);

    let head_object = roots.get(head);
    assert!(heap.old_space().includes(head_object.address()));
    assert!(heap.stats().bytes_promoted > 10_000 * Instance::allocation_size(2) / 2);
    assert_eq!(list_values(roots.value(head)).len(), 10_000);
    heap.verify().expect("remembered set and object starts");
}

/// Test: an old object keeps a young one alive and sees it move
#[test]
fn test_remembered_old_to_new_reference() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let holder = heap
        .create_old_space_instance(classes.pair(&roots), Object::ZERO, false)
        .expect("old instance");
    let holder_slot = roots.push(holder.as_object());

    let young = heap
        .create_instance(classes.pair(&roots), Object::from_smi(77), false)
        .expect("young instance");
    holder.set_field(1, young.as_object());
    heap.record_write(holder.as_heap_object());

    heap.collect_new_space(&mut roots);
    let holder = Instance::cast(roots.get(holder_slot));
    let moved = Instance::cast(HeapObject::cast(holder.get_field(1)));
    assert_ne!(moved.address(), young.address());
    assert!(heap.new_space().includes(moved.address()));
    heap.verify().expect("holder card stays dirty");

    heap.collect_new_space(&mut roots);
    let promoted = Instance::cast(HeapObject::cast(holder.get_field(1)));
    assert!(heap.old_space().includes(promoted.address()));
    assert_eq!(promoted.get_field(0), Object::from_smi(77));
}

/// Test: an old-space collection reclaims promoted garbage and the space
/// reuses it instead of growing
#[test]
fn test_old_space_reuses_swept_memory() {
    let mut heap = heap();
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let head = roots.push(Object::ZERO);

    build_list(&mut heap, &mut roots, classes, head, 5_000);
    heap.old_space_mut().set_allocation_budget(1 << 30);
    heap.collect_new_space(&mut roots);
    heap.collect_new_space(&mut roots);
    roots.set(head, Object::ZERO);
    let grown = heap.old_space().size();

    heap.collect_old_space(&mut roots);
    assert!(heap.old_space().used() < Instance::allocation_size(2) * 100);
    assert!(heap.old_space().free_list().total_free() > 5_000 * Instance::allocation_size(2) / 2);

    // Half the list fits in what the sweep freed.
    build_list(&mut heap, &mut roots, classes, head, 2_500);
    heap.old_space_mut().set_allocation_budget(1 << 30);
    heap.collect_new_space(&mut roots);
    heap.collect_new_space(&mut roots);
    assert_eq!(heap.old_space().size(), grown);
    assert_eq!(list_values(roots.value(head)).len(), 2_500);
}

/// Test: with promotion disabled everything stays young
#[test]
fn test_promotion_can_be_disabled() {
    let config = HeapConfig::default()
        .with_semi_space_size(16 * PAGE_SIZE)
        .with_promote_survivors(false);
    let mut heap = TwoSpaceHeap::new(test_metadata(), config);
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let head = roots.push(Object::ZERO);
    build_list(&mut heap, &mut roots, classes, head, 100);

    for _ in 0..4 {
        heap.collect_new_space(&mut roots);
    }
    assert_eq!(heap.old_space().used(), 0);
    assert_eq!(heap.stats().bytes_promoted, 0);
    assert!(heap.new_space().includes(roots.get(head).address()));
}
