//! Stack chaining integration tests
//!
//! A chaining collection links every live stack behind the process stack,
//! dropping dead ones and rebuilding the chain from scratch each time.

use core_types::{Address, Object};
use integration_tests::{test_metadata, ClassSlots, Roots};
use object_memory::{
    Heap, HeapConfig, HeapObject, ObjectAllocator, Space, Stack, TwoSpaceHeap,
};
use page_allocator::PAGE_SIZE;

/// Addresses of the stacks chained behind `process_stack`, sorted.
fn chained(process_stack: Stack) -> Vec<Address> {
    let mut addresses: Vec<Address> = std::iter::successors(process_stack.next(), |stack| stack.next())
        .map(|stack| stack.address())
        .collect();
    addresses.sort();
    addresses
}

fn rooted(roots: &Roots, slots: &[usize]) -> Vec<Address> {
    let mut addresses: Vec<Address> = slots.iter().map(|&slot| roots.get(slot).address()).collect();
    addresses.sort();
    addresses
}

/// Test: a scavenge chains the live stacks and leaves out the dead one
#[test]
fn test_scavenge_chains_live_stacks() {
    let mut heap = Heap::new(test_metadata(), &HeapConfig::default());
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let process_stack = heap.create_stack(classes.stack(&roots), 8).expect("process stack");
    process_stack.set(0, Object::from_smi(11));
    process_stack.set_top(0);

    let mut stack_slots = Vec::new();
    for _ in 0..3 {
        let stack = heap.create_stack(classes.stack(&roots), 4).expect("stack");
        stack_slots.push(roots.push(stack.as_object()));
    }
    heap.create_stack(classes.stack(&roots), 4).expect("dead stack");

    let mut process_slot = [process_stack.as_object()];
    let slot = Address::from_ptr(process_slot.as_mut_ptr());
    let stacks = heap.collect_garbage_and_chain_stacks(&mut roots, slot);
    assert_eq!(stacks, 4);

    let process_stack = Stack::cast(HeapObject::cast(process_slot[0]));
    assert!(heap.space().includes(process_stack.address()));
    assert_eq!(process_stack.get(0), Object::from_smi(11));
    assert_eq!(chained(process_stack), rooted(&roots, &stack_slots));

    // The old chain must not keep a stack alive.
    let dropped = stack_slots.remove(1);
    roots.set(dropped, Object::ZERO);
    let stacks = heap.collect_garbage_and_chain_stacks(&mut roots, slot);
    assert_eq!(stacks, 3);
    let process_stack = Stack::cast(HeapObject::cast(process_slot[0]));
    assert_eq!(chained(process_stack), rooted(&roots, &stack_slots));
}

/// Test: mark-sweep chains old stacks, including ones only new space
/// objects refer to
#[test]
fn test_mark_sweep_chains_stacks_reached_from_new_space() {
    let config = HeapConfig::default().with_semi_space_size(16 * PAGE_SIZE);
    let mut heap = TwoSpaceHeap::new(test_metadata(), config);
    let mut roots = Roots::new();
    let classes = ClassSlots::install(&mut heap, &mut roots);
    let process_stack = heap.create_stack(classes.stack(&roots), 8).expect("process stack");

    let direct = heap.create_stack(classes.stack(&roots), 4).expect("stack");
    let direct_slot = roots.push(direct.as_object());
    let held = heap.create_stack(classes.stack(&roots), 4).expect("stack");
    let holder = heap
        .create_instance(classes.pair(&roots), Object::ZERO, false)
        .expect("holder");
    holder.set_field(0, held.as_object());
    let holder_slot = roots.push(holder.as_object());
    let dead = heap.create_stack(classes.stack(&roots), 4).expect("dead stack");
    assert!(heap.old_space().includes(dead.address()));

    let mut process_slot = [process_stack.as_object()];
    let slot = Address::from_ptr(process_slot.as_mut_ptr());
    let stacks = heap.collect_old_space_and_chain_stacks(&mut roots, slot);
    assert_eq!(stacks, 3);

    // Stacks never move.
    assert_eq!(process_slot[0], process_stack.as_object());
    assert_eq!(roots.get(direct_slot), direct.as_heap_object());
    let mut expected = vec![direct.address(), held.address()];
    expected.sort();
    assert_eq!(chained(process_stack), expected);
    assert!(heap.new_space().includes(roots.get(holder_slot).address()));

    roots.set(holder_slot, Object::ZERO);
    let stacks = heap.collect_old_space_and_chain_stacks(&mut roots, slot);
    assert_eq!(stacks, 2);
    assert_eq!(chained(process_stack), vec![direct.address()]);
}
