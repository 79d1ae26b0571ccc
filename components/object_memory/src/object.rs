//! Heap object references.
//!
//! [`HeapObject`] is an untagged, word-aligned address of an object inside a
//! live chunk (or one of the static heap-structure classes). Every read and
//! write of object memory in this crate goes through this module; the
//! accessors are safe under that invariant.

#![allow(unsafe_code)]

use crate::format::{InstanceFormat, ObjectType};
use crate::gc_metadata::GcMetadata;
use crate::kinds::{Array, ByteArray, Class, Function, Stack, Str};
use crate::space::Space;
use crate::visitor::PointerVisitor;
use core_types::{round_up, Address, Object, Smi, WORD_SIZE};
use std::fmt;

/// Reads the reference stored in `slot`.
#[inline]
pub(crate) fn load_slot(slot: Address) -> Object {
    // SAFETY: slots handed around by the collectors lie in live chunks or in
    // root storage owned by the caller.
    Object::from_raw(unsafe { slot.load_word() })
}

/// Writes a reference into `slot`.
#[inline]
pub(crate) fn store_slot(slot: Address, value: Object) {
    // SAFETY: as for `load_slot`.
    unsafe { slot.store_word(value.raw()) }
}

/// Something a live object can be copied into.
pub trait RawAllocator {
    /// Returns `size` bytes of uninitialized space, or `None`.
    fn allocate_raw(&mut self, size: usize) -> Option<Address>;
}

/// The two meanings of an object's first word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// Normal execution: the object's class.
    Class(Class),
    /// Mid-scavenge: the address the object was copied to.
    Forwarded(HeapObject),
}

/// Reference to an object in the managed heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapObject(Address);

impl HeapObject {
    /// Offset of the class word.
    pub const CLASS_OFFSET: usize = 0;
    /// Size of the smallest object.
    pub const SIZE: usize = WORD_SIZE;

    #[inline]
    pub(crate) fn from_address(address: Address) -> Self {
        debug_assert!(address.is_aligned_to(WORD_SIZE));
        HeapObject(address)
    }

    /// Casts a tagged heap reference.
    #[inline]
    pub fn cast(object: Object) -> Self {
        debug_assert!(object.is_heap_object());
        HeapObject(object.heap_address())
    }

    /// Casts `object` if it is a heap reference.
    #[inline]
    pub fn try_cast(object: Object) -> Option<Self> {
        object.is_heap_object().then(|| HeapObject(object.heap_address()))
    }

    /// The tagged reference to this object.
    #[inline]
    pub fn as_object(self) -> Object {
        Object::from_address(self.0)
    }

    #[inline]
    pub fn address(self) -> Address {
        self.0
    }

    #[inline]
    pub(crate) fn at(self, offset: usize) -> Object {
        load_slot(self.0 + offset)
    }

    #[inline]
    pub(crate) fn at_put(self, offset: usize, value: Object) {
        store_slot(self.0 + offset, value)
    }

    #[inline]
    pub(crate) fn word_at(self, offset: usize) -> usize {
        // SAFETY: offsets stay inside the object.
        unsafe { (self.0 + offset).load_word() }
    }

    #[inline]
    pub(crate) fn word_at_put(self, offset: usize, value: usize) {
        // SAFETY: offsets stay inside the object.
        unsafe { (self.0 + offset).store_word(value) }
    }

    #[inline]
    pub(crate) fn smi_at(self, offset: usize) -> usize {
        let value = self.at(offset);
        debug_assert!(value.is_smi());
        value.smi_value() as usize
    }

    #[inline]
    pub(crate) fn smi_at_put(self, offset: usize, value: usize) {
        self.at_put(offset, Object::from_smi(value as isize))
    }

    #[inline]
    pub(crate) fn byte_at(self, offset: usize) -> u8 {
        // SAFETY: offsets stay inside the object.
        unsafe { (self.0 + offset).load_u8() }
    }

    #[inline]
    pub(crate) fn byte_at_put(self, offset: usize, value: u8) {
        // SAFETY: offsets stay inside the object.
        unsafe { (self.0 + offset).store_u8(value) }
    }

    #[inline]
    pub(crate) fn u16_at(self, offset: usize) -> u16 {
        // SAFETY: offsets stay inside the object and are 2-byte aligned.
        unsafe { (self.0 + offset).load_u16() }
    }

    #[inline]
    pub(crate) fn u16_at_put(self, offset: usize, value: u16) {
        // SAFETY: offsets stay inside the object and are 2-byte aligned.
        unsafe { (self.0 + offset).store_u16(value) }
    }

    #[inline]
    pub(crate) fn u64_at(self, offset: usize) -> u64 {
        // SAFETY: offsets stay inside the object.
        unsafe { (self.0 + offset).load_u64() }
    }

    #[inline]
    pub(crate) fn u64_at_put(self, offset: usize, value: u64) {
        // SAFETY: offsets stay inside the object.
        unsafe { (self.0 + offset).store_u64(value) }
    }

    /// Decodes the first word.
    pub fn header(self) -> Header {
        let word = self.word_at(Self::CLASS_OFFSET);
        if word & Smi::TAG_MASK == Smi::TAG {
            Header::Forwarded(HeapObject(Address::new(word)))
        } else {
            Header::Class(Class::cast(HeapObject::cast(Object::from_raw(word))))
        }
    }

    /// The object's class. The object must not be forwarded.
    pub fn class(self) -> Class {
        debug_assert!(!self.has_forwarding_address());
        Class::cast(HeapObject::cast(self.at(Self::CLASS_OFFSET)))
    }

    pub(crate) fn set_class(self, class: Class) {
        self.at_put(Self::CLASS_OFFSET, class.as_object());
    }

    /// Layout of this object.
    ///
    /// Reads the format straight out of the class, so it stays valid while
    /// the class itself carries a forwarding word.
    pub fn format(self) -> InstanceFormat {
        let class = HeapObject::cast(self.at(Self::CLASS_OFFSET));
        InstanceFormat::from_object(class.at(Class::FORMAT_OFFSET))
    }

    pub fn object_type(self) -> ObjectType {
        self.format().object_type()
    }

    /// Allocation size in bytes.
    pub fn size(self) -> usize {
        let format = self.format();
        if !format.has_variable_part() {
            return format.fixed_size();
        }
        match format.object_type() {
            ObjectType::Array => Array::allocation_size(self.smi_at(Array::LENGTH_OFFSET)),
            ObjectType::ByteArray => {
                ByteArray::allocation_size(self.smi_at(ByteArray::LENGTH_OFFSET))
            }
            ObjectType::String => Str::allocation_size(self.smi_at(Str::LENGTH_OFFSET)),
            ObjectType::Stack => Stack::allocation_size(self.smi_at(Stack::LENGTH_OFFSET)),
            ObjectType::Function => Function::allocation_size(
                self.smi_at(Function::BYTECODE_SIZE_OFFSET),
                self.smi_at(Function::LITERALS_SIZE_OFFSET),
            ),
            ObjectType::LargeInteger | ObjectType::Double => {
                format.fixed_size() + round_up(std::mem::size_of::<u64>(), WORD_SIZE)
            }
            ObjectType::FreeListChunk => self.word_at(WORD_SIZE),
            // A promoted track's end word is a raw address.
            ObjectType::PromotedTrack => self.word_at(2 * WORD_SIZE) - self.0.raw(),
            other => {
                debug_assert!(false, "{other:?} has no variable part");
                format.fixed_size()
            }
        }
    }

    /// Hands every outgoing reference slot to `visitor`.
    pub fn iterate_pointers<V: PointerVisitor + ?Sized>(self, visitor: &mut V) {
        // Read before the class slot is rewritten.
        let format = self.format();
        let address = self.0;
        visitor.visit_class(address);
        if format.only_pointers_in_fixed_part() {
            let fixed = format.fixed_size();
            if fixed > WORD_SIZE {
                visitor.visit_block(address.word(1), address + fixed);
            }
            return;
        }
        match format.object_type() {
            ObjectType::Array => {
                visitor.visit_block(address.word(2), address + self.size());
            }
            ObjectType::Stack => {
                visitor.visit(address + Stack::NEXT_OFFSET);
                let top = self.smi_at(Stack::TOP_OFFSET);
                let slots = address + Stack::SIZE;
                visitor.visit_block(slots, slots.word(top + 1));
            }
            ObjectType::Function => {
                let function = Function::cast(self);
                let literals = function.literal_address(0);
                visitor.visit_block(literals, literals.word(function.literals_size()));
            }
            _ => {}
        }
    }

    /// The raw header if it is a forwarding word, otherwise 0.
    pub fn forwarding_word(self) -> usize {
        let word = self.word_at(Self::CLASS_OFFSET);
        if word & Smi::TAG_MASK == Smi::TAG {
            word
        } else {
            0
        }
    }

    pub fn has_forwarding_address(self) -> bool {
        self.forwarding_word() != 0
    }

    /// Where this object was copied to, if it was.
    pub fn forwarding_address(self) -> Option<HeapObject> {
        match self.forwarding_word() {
            0 => None,
            word => Some(HeapObject(Address::new(word))),
        }
    }

    /// Overwrites the header with a forwarding word. At most once per
    /// scavenge.
    pub(crate) fn set_forwarding_address(self, target: HeapObject) {
        debug_assert!(!self.has_forwarding_address());
        // Word-aligned addresses already carry the Smi tag.
        self.word_at_put(Self::CLASS_OFFSET, target.0.raw());
    }

    /// Copies this object into `to` and leaves a forwarding word behind.
    ///
    /// Returns the existing copy if the object was already forwarded, and
    /// `None` if `to` is out of space.
    pub fn clone_in_to_space<A: RawAllocator + ?Sized>(self, to: &mut A) -> Option<HeapObject> {
        if let Some(target) = self.forwarding_address() {
            return Some(target);
        }
        let size = self.size();
        let target = to.allocate_raw(size)?;
        // SAFETY: both ranges are `size` bytes of live chunk memory and a
        // fresh allocation never overlaps a live object.
        unsafe { target.copy_from(self.0, size) };
        let clone = HeapObject(target);
        self.set_forwarding_address(clone);
        Some(clone)
    }

    /// Whether the mark bitmap has this object marked.
    pub fn is_marked(self, metadata: &GcMetadata) -> bool {
        metadata.is_marked(self.0)
    }

    /// Marks every word of this object.
    pub fn set_mark(self, metadata: &GcMetadata) {
        metadata.mark(self.0, self.size());
    }

    /// Returns true if any reference in this object points into `space`.
    pub fn contains_pointers_to<S: Space + ?Sized>(self, space: &S) -> bool {
        struct Finder<'a, S: ?Sized> {
            space: &'a S,
            found: bool,
        }
        impl<S: Space + ?Sized> PointerVisitor for Finder<'_, S> {
            fn visit_block(&mut self, start: Address, end: Address) {
                let mut slot = start;
                while slot < end {
                    let value = load_slot(slot);
                    if value.is_heap_object() && self.space.includes(value.heap_address()) {
                        self.found = true;
                    }
                    slot = slot.word(1);
                }
            }
        }
        let mut finder = Finder { space, found: false };
        self.iterate_pointers(&mut finder);
        finder.found
    }
}

impl fmt::Debug for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapObject({})", self.0)
    }
}
