//! Heaps: the allocation and collection entry points.
//!
//! [`ObjectAllocator`] builds typed objects on top of a raw `allocate`.
//! [`ManagedHeap`] adds collection, weak pointers and the retry policy.
//! [`Heap`] is the single-space flavour: one growable copying space.
//! The generational flavour lives in [`crate::two_space_heap`].

use crate::config::HeapConfig;
use crate::error::AllocError;
use crate::format::{InstanceFormat, ObjectType};
use crate::gc_metadata::GcMetadata;
use crate::kinds::{
    self, Array, Boxed, ByteArray, Class, Double, Function, Initializer, Instance, LargeInteger,
    Stack, Str,
};
use crate::logging::{log_gc_complete, log_gc_start};
use crate::object::HeapObject;
use crate::scavenge::{ScavengeAndChainStacksVisitor, ScavengeVisitor};
use crate::semi_space::SemiSpace;
use crate::space::{GcPhase, NoAllocationFailureScope, Space};
use crate::stats::GcStats;
use crate::visitor::{HeapObjectVisitor, PointerVisitor, RootProvider};
use crate::weak_pointer::WeakPointerList;
use core_types::{fatal, Address, FatalError, Object};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug_span, trace};

/// Where an allocation stands in the collect-and-retry protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryState {
    /// Nothing has failed yet.
    #[default]
    FirstAttempt,
    /// One failure, followed by a collection.
    AfterCollection,
    /// Failed again after collecting; the process cannot continue.
    Exhausted,
}

impl RetryState {
    /// The state after another `RetryAfterGc`.
    pub fn on_failure(self) -> RetryState {
        match self {
            RetryState::FirstAttempt => RetryState::AfterCollection,
            RetryState::AfterCollection | RetryState::Exhausted => RetryState::Exhausted,
        }
    }
}

/// Identity hashes for instances.
///
/// Xorshift64; hashes only need to spread, not to be unpredictable.
#[derive(Debug, Clone)]
pub(crate) struct IdentityHashes {
    state: u64,
}

impl IdentityHashes {
    const SEED: u64 = 0x2545_f491_4f6c_dd1d;

    /// Hashes fit a Smi after the instance flag bit.
    const MASK: u64 = (1 << 30) - 1;

    pub(crate) fn new() -> Self {
        IdentityHashes { state: Self::SEED }
    }

    pub(crate) fn next(&mut self) -> usize {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x & Self::MASK) as usize
    }
}

/// Allocation of heap objects.
///
/// Implementors supply raw allocation; the typed constructors are provided.
/// Every constructor checks the class format against the kind it builds.
pub trait ObjectAllocator {
    /// Allocates `size` bytes, uninitialized.
    ///
    /// Fails with [`AllocError::RetryAfterGc`] when a collection is due.
    fn allocate(&mut self, size: usize) -> Result<HeapObject, AllocError>;

    /// Allocates the memory of a stack. Defaults to [`ObjectAllocator::allocate`].
    fn allocate_stack(&mut self, size: usize) -> Result<HeapObject, AllocError> {
        self.allocate(size)
    }

    /// Next identity hash for an immutable instance.
    fn next_identity_hash(&mut self) -> usize;

    /// Creates an instance of `class` with every field set to `init`.
    ///
    /// Immutable instances get an identity hash right away.
    fn create_instance(
        &mut self,
        class: Class,
        init: Object,
        immutable: bool,
    ) -> Result<Instance, AllocError> {
        let format = class.format();
        debug_assert_eq!(format.object_type(), ObjectType::Instance);
        let object = self.allocate(format.fixed_size())?;
        let instance = Instance::initialize(object.address(), class, init, immutable);
        if immutable {
            let hash = self.next_identity_hash();
            instance.set_identity_hash(hash);
        }
        Ok(instance)
    }

    fn create_array(&mut self, class: Class, length: usize, init: Object) -> Result<Array, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::array_format());
        let object = self.allocate(Array::allocation_size(length))?;
        Ok(Array::initialize(object.address(), class, length, init))
    }

    /// Creates a zero-filled byte array.
    fn create_byte_array(&mut self, class: Class, length: usize) -> Result<ByteArray, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::byte_array_format());
        let object = self.allocate(ByteArray::allocation_size(length))?;
        Ok(ByteArray::initialize(object.address(), class, length))
    }

    fn create_large_integer(&mut self, class: Class, value: i64) -> Result<LargeInteger, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::large_integer_format());
        let object = self.allocate(LargeInteger::SIZE)?;
        Ok(LargeInteger::initialize(object.address(), class, value))
    }

    fn create_double(&mut self, class: Class, value: f64) -> Result<Double, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::double_format());
        let object = self.allocate(Double::SIZE)?;
        Ok(Double::initialize(object.address(), class, value))
    }

    fn create_boxed(&mut self, class: Class, value: Object) -> Result<Boxed, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::boxed_format());
        let object = self.allocate(Boxed::SIZE)?;
        Ok(Boxed::initialize(object.address(), class, value))
    }

    fn create_initializer(
        &mut self,
        class: Class,
        function: Function,
    ) -> Result<Initializer, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::initializer_format());
        let object = self.allocate(Initializer::SIZE)?;
        Ok(Initializer::initialize(object.address(), class, function))
    }

    /// Creates a string holding `units`.
    fn create_string(&mut self, class: Class, units: &[u16]) -> Result<Str, AllocError> {
        let string = self.create_string_uninitialized(class, units.len())?;
        for (i, unit) in units.iter().enumerate() {
            string.set_code_unit(i, *unit);
        }
        Ok(string)
    }

    /// Creates a string of `length` code units, all zero.
    fn create_string_uninitialized(&mut self, class: Class, length: usize) -> Result<Str, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::string_format());
        let object = self.allocate(Str::allocation_size(length))?;
        Ok(Str::initialize(object.address(), class, length))
    }

    /// Creates a stack of `length` slots, all Smi zero.
    fn create_stack(&mut self, class: Class, length: usize) -> Result<Stack, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::stack_format());
        let object = self.allocate_stack(Stack::allocation_size(length))?;
        Ok(Stack::initialize(object.address(), class, length, Object::ZERO))
    }

    /// Creates the class of classes; it is its own class.
    fn create_meta_class(&mut self) -> Result<Class, AllocError> {
        let object = self.allocate(Class::SIZE)?;
        let meta = Class::initialize(
            object.address(),
            kinds::meta_class(),
            InstanceFormat::class_format(),
            None,
        );
        meta.set_class(meta);
        Ok(meta)
    }

    /// Creates a class whose instances have `format`.
    ///
    /// # Arguments
    ///
    /// * `format` - Layout of the instances
    /// * `meta` - Class of the new class, normally from [`ObjectAllocator::create_meta_class`]
    /// * `super_class` - Superclass, if any
    fn create_class(
        &mut self,
        format: InstanceFormat,
        meta: Class,
        super_class: Option<Class>,
    ) -> Result<Class, AllocError> {
        debug_assert_eq!(meta.format(), InstanceFormat::class_format());
        let object = self.allocate(Class::SIZE)?;
        Ok(Class::initialize(object.address(), meta, format, super_class))
    }

    fn create_function(
        &mut self,
        class: Class,
        arity: usize,
        bytecodes: &[u8],
        literals: &[Object],
    ) -> Result<Function, AllocError> {
        debug_assert_eq!(class.format(), InstanceFormat::function_format());
        let size = Function::allocation_size(bytecodes.len(), literals.len());
        let object = self.allocate(size)?;
        Ok(Function::initialize(object.address(), class, arity, bytecodes, literals))
    }
}

/// A garbage collected heap.
pub trait ManagedHeap: ObjectAllocator {
    /// Collects garbage reachable from `roots`. Every root is updated.
    fn collect_garbage(&mut self, roots: &mut dyn RootProvider);

    /// Bytes occupied by objects in the allocation space.
    fn used(&self) -> usize;

    /// Bytes occupied by objects in every space.
    fn used_total(&self) -> usize {
        self.used()
    }

    /// Bytes of all chunks.
    fn size(&self) -> usize;

    /// Makes every space parseable.
    fn flush(&mut self);

    /// Visits every object in every space.
    fn iterate_objects(&mut self, visitor: &mut dyn HeapObjectVisitor);

    fn weak_pointers(&mut self) -> &mut WeakPointerList;

    fn stats(&self) -> &GcStats;

    /// Charges `size` bytes held outside the heap on behalf of objects.
    fn allocated_foreign_memory(&mut self, size: usize);

    fn freed_foreign_memory(&mut self, size: usize);

    /// Calls `callback` once `object` has been found dead.
    fn add_weak_pointer<F>(&mut self, object: HeapObject, callback: F)
    where
        Self: Sized,
        F: FnOnce(HeapObject) + Send + 'static,
    {
        self.weak_pointers().add(object, callback);
    }

    fn remove_weak_pointer(&mut self, object: HeapObject) -> bool {
        self.weak_pointers().remove(object)
    }

    /// Runs `op`, collecting once if it asks for a collection.
    ///
    /// A second `RetryAfterGc` means the heap cannot satisfy the request
    /// even after collecting, which is fatal. Other errors are returned.
    fn with_retry<T, F>(&mut self, roots: &mut dyn RootProvider, mut op: F) -> Result<T, AllocError>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<T, AllocError>,
    {
        let mut state = RetryState::FirstAttempt;
        loop {
            match op(self) {
                Err(AllocError::RetryAfterGc { size }) => {
                    state = state.on_failure();
                    if state == RetryState::Exhausted {
                        fatal(FatalError::AllocationRetryExhausted { size });
                    }
                    trace!(size, "collecting before retry");
                    self.collect_garbage(roots);
                }
                result => return result,
            }
        }
    }
}

/// A heap made of one growable copying space.
///
/// Collection copies the survivors into a fresh space sized after the
/// old one, then releases the old space as a whole.
#[derive(Debug)]
pub struct Heap {
    metadata: Arc<GcMetadata>,
    space: SemiSpace,
    weak_pointers: WeakPointerList,
    foreign_memory: usize,
    hashes: IdentityHashes,
    stats: GcStats,
}

impl Heap {
    pub fn new(metadata: Arc<GcMetadata>, config: &HeapConfig) -> Self {
        let mut space = SemiSpace::new(Arc::clone(&metadata), true, config.initial_space_size);
        space.adjust_allocation_budget(0);
        Heap {
            metadata,
            space,
            weak_pointers: WeakPointerList::new(),
            foreign_memory: 0,
            hashes: IdentityHashes::new(),
            stats: GcStats::default(),
        }
    }

    /// A heap on the process metadata, configured from the environment.
    pub fn from_env() -> Self {
        Self::new(GcMetadata::process(), &HeapConfig::from_env())
    }

    pub fn space(&self) -> &SemiSpace {
        &self.space
    }

    pub fn space_mut(&mut self) -> &mut SemiSpace {
        &mut self.space
    }

    /// Gives back `object` if it was the last allocation.
    pub fn try_dealloc(&mut self, object: HeapObject, size: usize) -> bool {
        self.space.try_dealloc(object, size)
    }

    /// Collects like [`ManagedHeap::collect_garbage`] and links every
    /// surviving stack behind the process stack held in `stack_slot`.
    ///
    /// Returns the number of stacks, the process stack included.
    pub fn collect_garbage_and_chain_stacks(
        &mut self,
        roots: &mut dyn RootProvider,
        stack_slot: Address,
    ) -> usize {
        self.scavenge(roots, Some(stack_slot))
    }

    fn scavenge(&mut self, roots: &mut dyn RootProvider, stack_slot: Option<Address>) -> usize {
        let start = Instant::now();
        self.space.flush();
        let used_before = self.space.used();
        let _span = debug_span!("scavenge", used = used_before).entered();
        log_gc_start("scavenge", used_before);

        let mut to = SemiSpace::new(Arc::clone(&self.metadata), true, used_before / 10);
        self.space.set_phase(GcPhase::Scavenging);
        let stacks = {
            let mut to = NoAllocationFailureScope::new(&mut to);
            match stack_slot {
                None => {
                    let mut visitor = ScavengeVisitor::new(&self.space, &mut to);
                    roots.iterate_roots(&mut visitor);
                    SemiSpace::complete_scavenge(&mut visitor);
                    0
                }
                Some(slot) => {
                    let mut visitor = ScavengeAndChainStacksVisitor::new(&self.space, &mut to);
                    visitor.visit(slot);
                    roots.iterate_roots(&mut visitor);
                    SemiSpace::complete_scavenge(&mut visitor);
                    visitor.number_of_stacks()
                }
            }
        };
        self.weak_pointers.process(&self.space);
        self.space.set_phase(GcPhase::Idle);

        // Dropping the old space releases its chunks.
        drop(std::mem::replace(&mut self.space, to));
        self.space.flush();
        self.space.adjust_allocation_budget(self.foreign_memory);

        let used_after = self.space.used();
        let pause = start.elapsed();
        self.stats
            .record_scavenge(pause, used_before.saturating_sub(used_after), 0);
        log_gc_complete("scavenge", used_before, used_after, pause);
        stacks
    }
}

impl ObjectAllocator for Heap {
    fn allocate(&mut self, size: usize) -> Result<HeapObject, AllocError> {
        self.space
            .allocate(size)
            .map(HeapObject::from_address)
            .ok_or(AllocError::RetryAfterGc { size })
    }

    fn next_identity_hash(&mut self) -> usize {
        self.hashes.next()
    }
}

impl ManagedHeap for Heap {
    fn collect_garbage(&mut self, roots: &mut dyn RootProvider) {
        self.scavenge(roots, None);
    }

    fn used(&self) -> usize {
        self.space.used()
    }

    fn size(&self) -> usize {
        self.space.size()
    }

    fn flush(&mut self) {
        self.space.flush();
    }

    fn iterate_objects(&mut self, visitor: &mut dyn HeapObjectVisitor) {
        self.space.iterate_objects(visitor);
    }

    fn weak_pointers(&mut self) -> &mut WeakPointerList {
        &mut self.weak_pointers
    }

    fn stats(&self) -> &GcStats {
        &self.stats
    }

    fn allocated_foreign_memory(&mut self, size: usize) {
        self.foreign_memory += size;
        self.space.decrease_allocation_budget(size);
    }

    fn freed_foreign_memory(&mut self, size: usize) {
        debug_assert!(size <= self.foreign_memory);
        self.foreign_memory = self.foreign_memory.saturating_sub(size);
        self.space.increase_allocation_budget(size);
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.weak_pointers.force_callbacks();
    }
}
