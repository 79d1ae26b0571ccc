//! Object Memory - managed heap and garbage collectors
//!
//! This component provides:
//! - Heap object layout: classes, instance formats and the object kinds
//! - Chunked spaces: a bump-allocated semi-space and a free-list old space
//! - A copying scavenger, optionally promoting into old space
//! - A non-recursive mark-sweep collector for old space
//! - Out-of-heap metadata: remembered set, object starts and mark bits
//! - Weak pointers with death callbacks
//!
//! # Example
//!
//! ```
//! use object_memory::{
//!     GcMetadata, Heap, HeapConfig, InstanceFormat, ManagedHeap, Marker, MetadataConfig,
//!     ObjectAllocator, PointerVisitor,
//! };
//! use core_types::Object;
//! use std::sync::Arc;
//!
//! let metadata = GcMetadata::setup(&MetadataConfig::default().with_arena_size(4 << 20)).unwrap();
//! let mut heap = Heap::new(Arc::new(metadata), &HeapConfig::default());
//!
//! let meta = heap.create_meta_class().unwrap();
//! let format = InstanceFormat::instance_format(1, Marker::None);
//! let class = heap.create_class(format, meta, None).unwrap();
//! let point = heap.create_instance(class, Object::from_smi(1), false).unwrap();
//!
//! let mut roots = [meta.as_object(), class.as_object(), point.as_object()];
//! heap.collect_garbage(&mut |visitor: &mut dyn PointerVisitor| visitor.visit_slice(&mut roots));
//! assert_eq!(heap.stats().scavenges, 1);
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod chunk;
pub mod config;
pub mod error;
pub mod format;
pub mod free_list;
pub mod gc_metadata;
pub mod heap;
pub mod kinds;
pub mod logging;
pub mod marking;
pub mod object;
pub mod old_space;
pub mod scavenge;
pub mod semi_space;
pub mod space;
pub mod stats;
pub mod sweeper;
pub mod two_space_heap;
pub mod visitor;
pub mod weak_pointer;

// Re-export main types
pub use chunk::Chunk;
pub use config::{HeapConfig, MetadataConfig};
pub use error::{AllocError, VerifyError};
pub use format::{InstanceFormat, Marker, ObjectType};
pub use free_list::FreeList;
pub use gc_metadata::GcMetadata;
pub use heap::{Heap, ManagedHeap, ObjectAllocator, RetryState};
pub use kinds::{
    Array, Boxed, ByteArray, Class, Coroutine, Double, Function, Initializer, Instance,
    LargeInteger, Stack, Str,
};
pub use object::HeapObject;
pub use old_space::OldSpace;
pub use semi_space::SemiSpace;
pub use space::{GcPhase, NoAllocationFailureScope, Reclaimed, Space};
pub use stats::GcStats;
pub use two_space_heap::TwoSpaceHeap;
pub use visitor::{HeapObjectVisitor, NoRoots, PointerVisitor, RootProvider};
pub use weak_pointer::{WeakPointer, WeakPointerList};

// Re-export collector types
pub use marking::{MarkAndChainStacksVisitor, MarkingScan, MarkingStack, MarkingVisitor};
pub use scavenge::{
    GenerationalScavengeVisitor, PromotionScan, Record, ScavengeAndChainStacksVisitor,
    ScavengeScan, ScavengeVisitor,
};
pub use sweeper::SweepingVisitor;
