//! Generational heap: a fixed-size copying new space over a mark-sweep
//! old space.

use crate::config::HeapConfig;
use crate::error::AllocError;
use crate::format::ObjectType;
use crate::gc_metadata::GcMetadata;
use crate::heap::{IdentityHashes, ManagedHeap, ObjectAllocator};
use crate::kinds::{Class, Instance};
use crate::logging::{log_gc_complete, log_gc_start};
use crate::marking::{MarkAndChainStacksVisitor, MarkingScan, MarkingStack, MarkingVisitor};
use crate::object::HeapObject;
use crate::old_space::OldSpace;
use crate::scavenge::GenerationalScavengeVisitor;
use crate::semi_space::SemiSpace;
use crate::space::{GcPhase, Space};
use crate::stats::GcStats;
use crate::visitor::{HeapObjectVisitor, PointerVisitor, RootProvider};
use crate::weak_pointer::WeakPointerList;
use core_types::{Address, Object};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, debug_span};

/// New objects are bump allocated in a fixed-size semi-space. A scavenge
/// copies young survivors into the other semi-space and promotes the ones
/// that already survived a scavenge into old space. Old space is collected
/// by mark-sweep once its budget runs out.
#[derive(Debug)]
pub struct TwoSpaceHeap {
    metadata: Arc<GcMetadata>,
    config: HeapConfig,
    new_space: SemiSpace,
    unused_space: SemiSpace,
    old_space: OldSpace,
    weak_pointers: WeakPointerList,
    foreign_memory: usize,
    hashes: IdentityHashes,
    stats: GcStats,
}

impl TwoSpaceHeap {
    /// Creates a heap with two semi-spaces of `config.semi_space_size`.
    ///
    /// # Panics
    ///
    /// Panics (fatally) if the semi-spaces cannot be allocated.
    pub fn new(metadata: Arc<GcMetadata>, config: HeapConfig) -> Self {
        let new_space = SemiSpace::new(Arc::clone(&metadata), false, config.semi_space_size);
        let unused_space = SemiSpace::new(Arc::clone(&metadata), false, config.semi_space_size);
        let mut old_space = OldSpace::new(Arc::clone(&metadata));
        old_space.adjust_allocation_budget(0);
        TwoSpaceHeap {
            metadata,
            config,
            new_space,
            unused_space,
            old_space,
            weak_pointers: WeakPointerList::new(),
            foreign_memory: 0,
            hashes: IdentityHashes::new(),
            stats: GcStats::default(),
        }
    }

    /// A heap on the process metadata, configured from the environment.
    pub fn from_env() -> Self {
        Self::new(GcMetadata::process(), HeapConfig::from_env())
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn new_space(&self) -> &SemiSpace {
        &self.new_space
    }

    pub fn old_space(&self) -> &OldSpace {
        &self.old_space
    }

    pub fn old_space_mut(&mut self) -> &mut OldSpace {
        &mut self.old_space
    }

    /// True once old space has spent its budget.
    pub fn needs_old_space_collection(&self) -> bool {
        self.old_space.needs_garbage_collection()
    }

    /// Write barrier: notes that `holder` may now point into new space.
    pub fn record_write(&self, holder: HeapObject) {
        if self.old_space.includes(holder.address()) {
            self.metadata.insert_into_remembered_set(holder.address());
        }
    }

    /// Checks the old-space tables against the heap contents.
    pub fn verify(&mut self) -> Result<(), crate::error::VerifyError> {
        self.new_space.flush();
        self.old_space.verify(&self.new_space)
    }

    fn allocate_old(&mut self, size: usize) -> Result<HeapObject, AllocError> {
        let address = self
            .old_space
            .allocate(size)
            .ok_or(AllocError::RetryAfterGc { size })?;
        // Filled in by the caller, possibly with new-space references.
        self.metadata.insert_into_remembered_set(address);
        Ok(HeapObject::from_address(address))
    }

    /// Creates an instance directly in old space.
    pub fn create_old_space_instance(
        &mut self,
        class: Class,
        init: Object,
        immutable: bool,
    ) -> Result<Instance, AllocError> {
        let format = class.format();
        debug_assert_eq!(format.object_type(), ObjectType::Instance);
        let object = self.allocate_old(format.fixed_size())?;
        let instance = Instance::initialize(object.address(), class, init, immutable);
        if immutable {
            instance.set_identity_hash(self.hashes.next());
        }
        Ok(instance)
    }

    /// Scavenges new space, promoting survivors of an earlier scavenge.
    pub fn collect_new_space(&mut self, roots: &mut dyn RootProvider) {
        self.scavenge(roots, false);
    }

    /// True when survivors take up more than half of new space, leaving
    /// too little room for the allocations that follow.
    fn new_space_is_crowded(&self) -> bool {
        self.new_space.used() > self.config.semi_space_size / 2
    }

    fn scavenge(&mut self, roots: &mut dyn RootProvider, promote_all: bool) {
        let start = Instant::now();
        self.new_space.flush();
        self.old_space.flush();
        let used_before = self.new_space.used();
        let _span = debug_span!("scavenge", used = used_before).entered();
        log_gc_start("scavenge", used_before);

        self.unused_space.reset();
        self.old_space.start_tracking_allocations();
        self.new_space.set_phase(GcPhase::Scavenging);
        let (trigger_old_space_gc, promoted) = {
            let mut visitor = GenerationalScavengeVisitor::new(
                &self.new_space,
                &mut self.unused_space,
                &mut self.old_space,
            );
            if promote_all {
                visitor = visitor.promoting_all();
            }
            roots.iterate_roots(&mut visitor);
            OldSpace::visit_remembered_set(&mut visitor);
            loop {
                let young = SemiSpace::complete_scavenge_generational(&mut visitor);
                let old = OldSpace::complete_scavenge_generational(&mut visitor);
                if !young && !old {
                    break;
                }
            }
            (visitor.trigger_old_space_gc(), visitor.promoted())
        };
        self.old_space.end_tracking_allocations();
        self.weak_pointers.process(&self.new_space);
        self.new_space.set_phase(GcPhase::Idle);

        std::mem::swap(&mut self.new_space, &mut self.unused_space);
        self.new_space.flush();
        let water_mark = if self.config.promote_survivors {
            self.new_space.top()
        } else {
            Address::NULL
        };
        self.new_space.set_water_mark(water_mark);

        let used_after = self.new_space.used();
        let pause = start.elapsed();
        self.stats.record_scavenge(
            pause,
            used_before.saturating_sub(used_after + promoted),
            promoted,
        );
        if trigger_old_space_gc {
            debug!(promoted, "old space refused a promotion");
        }
        log_gc_complete("scavenge", used_before, used_after, pause);
    }

    /// Scavenges new space, then marks and sweeps old space.
    pub fn collect_old_space(&mut self, roots: &mut dyn RootProvider) {
        self.collect_new_space(roots);
        self.mark_sweep(roots, None);
    }

    /// Like [`TwoSpaceHeap::collect_old_space`], also linking every live
    /// stack behind the process stack held in `stack_slot`.
    ///
    /// Returns the number of stacks, the process stack included.
    pub fn collect_old_space_and_chain_stacks(
        &mut self,
        roots: &mut dyn RootProvider,
        stack_slot: Address,
    ) -> usize {
        self.collect_new_space(roots);
        self.mark_sweep(roots, Some(stack_slot))
    }

    fn mark_sweep(&mut self, roots: &mut dyn RootProvider, stack_slot: Option<Address>) -> usize {
        let start = Instant::now();
        self.new_space.flush();
        self.old_space.flush();
        let used_before = self.old_space.used();
        let _span = debug_span!("mark_sweep", used = used_before).entered();
        log_gc_start("mark_sweep", used_before);

        self.old_space.clear_mark_bits();
        self.old_space.set_phase(GcPhase::Marking);
        let stacks = match stack_slot {
            None => {
                let mut marker = MarkingVisitor::new(&self.old_space);
                mark_live_objects(&mut marker, roots, &mut self.new_space);
                0
            }
            Some(slot) => {
                let mut marker = MarkAndChainStacksVisitor::new(&self.old_space);
                marker.visit(slot);
                mark_live_objects(&mut marker, roots, &mut self.new_space);
                marker.number_of_stacks()
            }
        };
        self.weak_pointers.process(&self.old_space);

        self.old_space.set_phase(GcPhase::Sweeping);
        let used_after = self.old_space.sweep();
        self.old_space.set_phase(GcPhase::Idle);
        self.old_space.adjust_allocation_budget(self.foreign_memory);

        let pause = start.elapsed();
        self.stats
            .record_mark_sweep(pause, used_before.saturating_sub(used_after));
        log_gc_complete("mark_sweep", used_before, used_after, pause);
        stacks
    }
}

/// Marks from the roots and from every new-space object, which all count
/// as live during an old-space collection.
fn mark_live_objects<M: MarkingScan>(
    marker: &mut M,
    roots: &mut dyn RootProvider,
    new_space: &mut SemiSpace,
) {
    struct NewSpaceRoots<'m, M>(&'m mut M);

    impl<M: MarkingScan> HeapObjectVisitor for NewSpaceRoots<'_, M> {
        fn visit(&mut self, object: HeapObject) -> usize {
            object.iterate_pointers(&mut *self.0);
            object.size()
        }
    }

    roots.iterate_roots(marker);
    new_space.iterate_objects(&mut NewSpaceRoots(&mut *marker));
    MarkingStack::process(marker);
}

impl ObjectAllocator for TwoSpaceHeap {
    /// Allocates in new space. Requests of at least half a semi-space go
    /// to old space when new space is full.
    fn allocate(&mut self, size: usize) -> Result<HeapObject, AllocError> {
        if let Some(address) = self.new_space.allocate(size) {
            return Ok(HeapObject::from_address(address));
        }
        if size >= self.config.semi_space_size / 2 {
            return self.allocate_old(size);
        }
        Err(AllocError::RetryAfterGc { size })
    }

    /// Stacks live in old space.
    fn allocate_stack(&mut self, size: usize) -> Result<HeapObject, AllocError> {
        self.allocate_old(size)
    }

    fn next_identity_hash(&mut self) -> usize {
        self.hashes.next()
    }
}

impl ManagedHeap for TwoSpaceHeap {
    fn collect_garbage(&mut self, roots: &mut dyn RootProvider) {
        self.collect_new_space(roots);
        if self.config.promote_survivors && self.new_space_is_crowded() {
            debug!(used = self.new_space.used(), "promoting crowded new space");
            self.scavenge(roots, true);
        }
        if self.needs_old_space_collection() {
            self.mark_sweep(roots, None);
        }
    }

    fn used(&self) -> usize {
        self.new_space.used()
    }

    fn used_total(&self) -> usize {
        self.new_space.used() + self.old_space.used()
    }

    fn size(&self) -> usize {
        self.new_space.size() + self.old_space.size()
    }

    fn flush(&mut self) {
        self.new_space.flush();
        self.old_space.flush();
    }

    fn iterate_objects(&mut self, visitor: &mut dyn HeapObjectVisitor) {
        self.new_space.iterate_objects(visitor);
        self.old_space.iterate_objects(visitor);
    }

    fn weak_pointers(&mut self) -> &mut WeakPointerList {
        &mut self.weak_pointers
    }

    fn stats(&self) -> &GcStats {
        &self.stats
    }

    fn allocated_foreign_memory(&mut self, size: usize) {
        self.foreign_memory += size;
        self.old_space.decrease_allocation_budget(size);
    }

    fn freed_foreign_memory(&mut self, size: usize) {
        debug_assert!(size <= self.foreign_memory);
        self.foreign_memory = self.foreign_memory.saturating_sub(size);
        self.old_space.increase_allocation_budget(size);
    }
}

impl Drop for TwoSpaceHeap {
    fn drop(&mut self) {
        self.weak_pointers.force_callbacks();
    }
}
