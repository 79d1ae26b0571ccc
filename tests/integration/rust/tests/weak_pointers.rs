//! Weak pointer integration tests
//!
//! Weak registrations must follow their objects across scavenges and
//! promotion, fire exactly once when the object dies, and fire for every
//! remaining registration when the heap goes away.

use core_types::Object;
use integration_tests::{test_metadata, ClassSlots, Roots};
use object_memory::{
    Heap, HeapConfig, HeapObject, ManagedHeap, ObjectAllocator, Space, TwoSpaceHeap,
};
use page_allocator::PAGE_SIZE;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn count_into(counter: &Arc<AtomicUsize>) -> impl FnOnce(HeapObject) + Send + 'static {
    let counter = Arc::clone(counter);
    move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test: a scavenge fires for the dead object and updates the live one
#[test]
fn test_scavenge_fires_dead_and_tracks_live() {
    let mut heap = Heap::new(test_metadata(), &HeapConfig::default());
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let live = heap
        .create_instance(classes.pair(&roots), Object::ZERO, false)
        .expect("live");
    let dead = heap
        .create_instance(classes.pair(&roots), Object::ZERO, false)
        .expect("dead");
    let live_slot = roots.push(live.as_object());

    let live_fired = counter();
    let dead_fired = counter();
    heap.add_weak_pointer(live.as_heap_object(), count_into(&live_fired));
    heap.add_weak_pointer(dead.as_heap_object(), count_into(&dead_fired));

    heap.collect_garbage(&mut roots);
    assert_eq!(dead_fired.load(Ordering::SeqCst), 1);
    assert_eq!(live_fired.load(Ordering::SeqCst), 0);
    assert_eq!(heap.weak_pointers().len(), 1);
    let tracked = heap.weak_pointers().iter().next().map(|weak| weak.object());
    assert_eq!(tracked, Some(roots.get(live_slot)));

    // The callback receives the object's last known location.
    let seen = Arc::new(Mutex::new(None));
    let seen_in_callback = Arc::clone(&seen);
    let moved = roots.get(live_slot);
    assert!(heap.remove_weak_pointer(moved));
    heap.add_weak_pointer(moved, move |object| {
        *seen_in_callback.lock() = Some(object);
    });
    roots.set(live_slot, Object::ZERO);
    heap.collect_garbage(&mut roots);
    assert_eq!(*seen.lock(), Some(moved));
    assert_eq!(live_fired.load(Ordering::SeqCst), 0);
}

/// Test: registrations follow promotion and fire on mark-sweep death
#[test]
fn test_weak_pointer_through_promotion_and_mark_sweep() {
    let config = HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE);
    let mut heap = TwoSpaceHeap::new(test_metadata(), config);
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let object = heap
        .create_instance(classes.pair(&roots), Object::ZERO, false)
        .expect("instance");
    let slot = roots.push(object.as_object());
    let fired = counter();
    heap.add_weak_pointer(object.as_heap_object(), count_into(&fired));

    heap.collect_new_space(&mut roots);
    heap.collect_new_space(&mut roots);
    let promoted = roots.get(slot);
    assert!(heap.old_space().includes(promoted.address()));
    assert_eq!(heap.weak_pointers().iter().next().map(|weak| weak.object()), Some(promoted));

    heap.collect_new_space(&mut roots);
    assert_eq!(fired.load(Ordering::SeqCst), 0, "scavenges leave old objects alone");

    roots.set(slot, Object::ZERO);
    heap.collect_old_space(&mut roots);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(heap.weak_pointers().is_empty());
}

/// Test: dropping a heap fires every remaining registration once
#[test]
fn test_teardown_forces_callbacks() {
    let fired = counter();
    let removed = counter();
    {
        let config = HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE);
        let mut heap = TwoSpaceHeap::new(test_metadata(), config);
        let mut roots = Roots::new();
        let classes = ClassSlots::install(&mut heap, &mut roots);
        for _ in 0..3 {
            let object = heap
                .create_instance(classes.pair(&roots), Object::ZERO, false)
                .expect("instance");
            roots.push(object.as_object());
            heap.add_weak_pointer(object.as_heap_object(), count_into(&fired));
        }
        let unwatched = heap
            .create_instance(classes.pair(&roots), Object::ZERO, false)
            .expect("instance");
        heap.add_weak_pointer(unwatched.as_heap_object(), count_into(&removed));
        assert!(heap.remove_weak_pointer(unwatched.as_heap_object()));
        heap.collect_new_space(&mut roots);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 3);
    assert_eq!(removed.load(Ordering::SeqCst), 0);
}
