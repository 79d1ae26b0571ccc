//! Integration test suite for the object memory
//!
//! This crate provides cross-component scenarios: the page allocator under
//! the GC metadata, both heap flavours, and the collectors working
//! together with weak pointers and stack chaining.

use core_types::Object;
use object_memory::{
    AllocError, Class, GcMetadata, HeapObject, InstanceFormat, ManagedHeap, Marker,
    MetadataConfig, ObjectAllocator, PointerVisitor, RootProvider,
};
use std::sync::Arc;

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use object_memory;
    pub use page_allocator;
}

/// Metadata over a private 16 MiB arena.
pub fn test_metadata() -> Arc<GcMetadata> {
    let config = MetadataConfig::default().with_arena_size(16 << 20);
    Arc::new(GcMetadata::setup(&config).expect("metadata setup"))
}

/// Root slots owned by a test. Collections rewrite them in place, so
/// objects are always re-read through [`Roots::get`] after a collection.
#[derive(Debug, Default)]
pub struct Roots {
    slots: Vec<Object>,
}

impl Roots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root and returns its index.
    pub fn push(&mut self, value: Object) -> usize {
        self.slots.push(value);
        self.slots.len() - 1
    }

    pub fn value(&self, index: usize) -> Object {
        self.slots[index]
    }

    pub fn get(&self, index: usize) -> HeapObject {
        HeapObject::cast(self.slots[index])
    }

    pub fn set(&mut self, index: usize, value: Object) {
        self.slots[index] = value;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl RootProvider for Roots {
    fn iterate_roots(&mut self, visitor: &mut dyn PointerVisitor) {
        visitor.visit_slice(&mut self.slots);
    }
}

/// Root indexes of the classes most scenarios need.
#[derive(Debug, Clone, Copy)]
pub struct ClassSlots {
    pub meta: usize,
    /// Instances with two fields.
    pub pair: usize,
    pub array: usize,
    pub stack: usize,
    pub string: usize,
}

impl ClassSlots {
    /// Creates the classes in `heap` and roots them.
    pub fn install<H: ObjectAllocator>(heap: &mut H, roots: &mut Roots) -> ClassSlots {
        let meta = heap.create_meta_class().expect("meta class");
        let mut class = |format: InstanceFormat| {
            let class = heap.create_class(format, meta, None).expect("class");
            roots.push(class.as_object())
        };
        let pair = class(InstanceFormat::instance_format(2, Marker::None));
        let array = class(InstanceFormat::array_format());
        let stack = class(InstanceFormat::stack_format());
        let string = class(InstanceFormat::string_format());
        ClassSlots {
            meta: roots.push(meta.as_object()),
            pair,
            array,
            stack,
            string,
        }
    }

    pub fn pair(&self, roots: &Roots) -> Class {
        Class::cast(roots.get(self.pair))
    }

    pub fn array(&self, roots: &Roots) -> Class {
        Class::cast(roots.get(self.array))
    }

    pub fn stack(&self, roots: &Roots) -> Class {
        Class::cast(roots.get(self.stack))
    }

    pub fn string(&self, roots: &Roots) -> Class {
        Class::cast(roots.get(self.string))
    }
}

/// Runs `op`, collecting once with `roots` if it asks for a collection.
///
/// Unlike [`ManagedHeap::with_retry`], `op` sees the roots, so it can
/// re-read objects a collection moved.
pub fn allocate_with_retry<H, T, F>(heap: &mut H, roots: &mut Roots, mut op: F) -> T
where
    H: ManagedHeap,
    F: FnMut(&mut H, &Roots) -> Result<T, AllocError>,
{
    match op(heap, roots) {
        Ok(value) => value,
        Err(error) => {
            assert!(error.is_retry_after_gc(), "unexpected {error:?}");
            heap.collect_garbage(roots);
            op(heap, roots).expect("allocation after collection")
        }
    }
}

/// Builds a list of `length` pairs `(i, next)` ending in Smi 0, with the
/// head stored in root `head`. The last pair holds 0, the first `length - 1`.
pub fn build_list<H: ManagedHeap>(
    heap: &mut H,
    roots: &mut Roots,
    classes: ClassSlots,
    head: usize,
    length: usize,
) {
    for i in 0..length {
        let pair = allocate_with_retry(heap, roots, |heap, roots| {
            heap.create_instance(classes.pair(roots), Object::ZERO, false)
        });
        pair.set_field(0, Object::from_smi(i as isize));
        pair.set_field(1, roots.value(head));
        roots.set(head, pair.as_object());
    }
}

/// Walks a list built by [`build_list`] and returns its values, head first.
pub fn list_values(head: Object) -> Vec<isize> {
    let mut values = Vec::new();
    let mut current = head;
    while let Some(object) = HeapObject::try_cast(current) {
        let pair = object_memory::Instance::cast(object);
        values.push(pair.get_field(0).smi_value());
        current = pair.get_field(1);
    }
    values
}
