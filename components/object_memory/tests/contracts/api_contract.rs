//! Contract tests verifying the object_memory API.
//! These tests ensure the exported types and functions exist with the
//! expected signatures and basic behavior.

use core_types::{FailureKind, Object};
use object_memory::{
    AllocError, Class, GcMetadata, GcPhase, Heap, HeapConfig, HeapObject, HeapObjectVisitor,
    InstanceFormat, ManagedHeap, Marker, MetadataConfig, NoRoots, ObjectAllocator, ObjectType,
    PointerVisitor, RetryState, SemiSpace, Space, TwoSpaceHeap,
};
use std::sync::Arc;

fn metadata() -> Arc<GcMetadata> {
    Arc::new(GcMetadata::setup(&MetadataConfig::default().with_arena_size(8 << 20)).unwrap())
}

fn heap() -> Heap {
    Heap::new(metadata(), &HeapConfig::default())
}

/// Test GcMetadata contract: setup(&MetadataConfig) -> Result<Self, FatalError>
#[test]
fn contract_metadata_setup() {
    let metadata = metadata();
    assert!(metadata.heap_extent() >= 8 << 20);
    assert!(metadata.number_of_cards() > 0);
}

/// Test GcMetadata contract: process() -> Arc<GcMetadata> is a singleton
#[test]
fn contract_metadata_process_singleton() {
    let first = GcMetadata::process();
    let second = GcMetadata::process();
    assert!(Arc::ptr_eq(&first, &second));
}

/// Test HeapConfig contract: defaults and builder setters
#[test]
fn contract_heap_config_builders() {
    let config = HeapConfig::default()
        .with_semi_space_size(64 * 1024)
        .with_initial_space_size(4096)
        .with_promote_survivors(false);
    assert_eq!(config.semi_space_size, 64 * 1024);
    assert_eq!(config.initial_space_size, 4096);
    assert!(!config.promote_survivors);
    assert!(HeapConfig::default().promote_survivors);
}

/// Test Heap contract: allocate(size) -> Result<HeapObject, AllocError>
#[test]
fn contract_heap_allocate() {
    let mut heap = heap();
    let object = heap.allocate(4 * core_types::WORD_SIZE).unwrap();
    assert!(heap.space().includes(object.address()));
}

/// Test ObjectAllocator contract: create_meta_class() -> Class of itself
#[test]
fn contract_create_meta_class() {
    let mut heap = heap();
    let meta = heap.create_meta_class().unwrap();
    assert_eq!(meta.class(), meta);
    assert_eq!(meta.object_type(), ObjectType::Class);
}

/// Test ObjectAllocator contract: the create_* helpers build each kind
#[test]
fn contract_create_helpers() {
    let mut heap = heap();
    let meta = heap.create_meta_class().unwrap();
    let class_for = |heap: &mut Heap, format: InstanceFormat| -> Class {
        heap.create_class(format, meta, None).unwrap()
    };

    let array_class = class_for(&mut heap, InstanceFormat::array_format());
    let array = heap.create_array(array_class, 3, Object::from_smi(2)).unwrap();
    assert_eq!(array.length(), 3);
    assert_eq!(array.get(2), Object::from_smi(2));

    let bytes_class = class_for(&mut heap, InstanceFormat::byte_array_format());
    let bytes = heap.create_byte_array(bytes_class, 5).unwrap();
    assert_eq!(bytes.to_vec(), vec![0; 5]);

    let large_class = class_for(&mut heap, InstanceFormat::large_integer_format());
    let large = heap.create_large_integer(large_class, i64::MIN).unwrap();
    assert_eq!(large.value(), i64::MIN);

    let boxed_class = class_for(&mut heap, InstanceFormat::boxed_format());
    let boxed = heap.create_boxed(boxed_class, Object::from_smi(11)).unwrap();
    assert_eq!(boxed.value(), Object::from_smi(11));

    let function_class = class_for(&mut heap, InstanceFormat::function_format());
    let function = heap
        .create_function(function_class, 2, &[1, 2, 3], &[Object::from_smi(4)])
        .unwrap();
    assert_eq!(function.arity(), 2);
    assert_eq!(function.bytecode_at(2), 3);
    assert_eq!(function.literal_at(0), Object::from_smi(4));

    let initializer_class = class_for(&mut heap, InstanceFormat::initializer_format());
    let initializer = heap.create_initializer(initializer_class, function).unwrap();
    assert_eq!(initializer.function(), function);

    let string_class = class_for(&mut heap, InstanceFormat::string_format());
    let string = heap.create_string_uninitialized(string_class, 2).unwrap();
    assert_eq!(string.length(), 2);
    assert_eq!(string.code_unit(1), 0);

    let stack_class = class_for(&mut heap, InstanceFormat::stack_format());
    let stack = heap.create_stack(stack_class, 8).unwrap();
    assert_eq!(stack.length(), 8);
    assert_eq!(stack.next(), None);
}

/// Test ManagedHeap contract: collect_garbage(&mut dyn RootProvider) updates roots
#[test]
fn contract_collect_garbage_updates_roots() {
    let mut heap = heap();
    let meta = heap.create_meta_class().unwrap();
    let class = heap
        .create_class(InstanceFormat::instance_format(0, Marker::None), meta, None)
        .unwrap();
    let mut roots = [class.as_object()];
    heap.collect_garbage(&mut |visitor: &mut dyn PointerVisitor| visitor.visit_slice(&mut roots));
    let moved = HeapObject::cast(roots[0]);
    assert_ne!(moved, class.as_heap_object());
    assert!(heap.space().includes(moved.address()));
    assert_eq!(heap.space().phase(), GcPhase::Idle);
}

/// Test ManagedHeap contract: iterate_objects visits every object once
#[test]
fn contract_iterate_objects() {
    struct Count(usize, usize);
    impl HeapObjectVisitor for Count {
        fn visit(&mut self, object: HeapObject) -> usize {
            self.0 += 1;
            self.1 += object.size();
            object.size()
        }
    }

    let mut heap = heap();
    let meta = heap.create_meta_class().unwrap();
    heap.create_class(InstanceFormat::array_format(), meta, None)
        .unwrap();
    let mut count = Count(0, 0);
    heap.iterate_objects(&mut count);
    assert_eq!(count.0, 2);
    assert_eq!(count.1, heap.used());
}

/// Test AllocError contract: converts to an in-band failure word
#[test]
fn contract_alloc_error_failure_word() {
    let error = AllocError::RetryAfterGc { size: 64 };
    assert!(error.is_retry_after_gc());
    assert_eq!(error.size(), Some(64));
    let word: Object = error.into();
    assert!(word.is_failure());
    assert_eq!(word.failure_kind(), Some(FailureKind::RetryAfterGc));
}

/// Test RetryState contract: on_failure advances to Exhausted
#[test]
fn contract_retry_state() {
    let state = RetryState::FirstAttempt.on_failure();
    assert_eq!(state, RetryState::AfterCollection);
    assert_eq!(state.on_failure(), RetryState::Exhausted);
}

/// Test SemiSpace contract: a fixed-size space refuses to grow
#[test]
fn contract_semi_space_fixed() {
    let mut space = SemiSpace::new(metadata(), false, 4096);
    assert!(!space.is_resizeable());
    assert!(space.allocate(8192).is_none());
}

/// Test TwoSpaceHeap contract: new(metadata, config) and the collections
#[test]
fn contract_two_space_heap() {
    let mut heap = TwoSpaceHeap::new(metadata(), HeapConfig::default());
    assert_eq!(heap.used(), 0);
    assert!(heap.size() >= HeapConfig::default().semi_space_size);
    heap.collect_new_space(&mut NoRoots);
    heap.collect_old_space(&mut NoRoots);
    assert_eq!(heap.stats().scavenges, 2);
    assert_eq!(heap.stats().mark_sweeps, 1);
    assert_eq!(heap.used_total(), 0);
}
