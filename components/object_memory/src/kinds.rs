//! Typed views of the heap object kinds.
//!
//! Each kind is a `Copy` newtype over [`HeapObject`] that dereferences to
//! it, so generic operations (size, class, pointer iteration) are always
//! available. Offsets are in bytes from the object start.
//!
//! `initialize` functions take freshly allocated memory of at least
//! `allocation_size` bytes and write a complete object into it.

use crate::format::{InstanceFormat, Marker, ObjectType};
use crate::object::HeapObject;
use core_types::{round_up, Address, Object, WORD_SIZE};
use once_cell::sync::Lazy;
use std::ops::Deref;

macro_rules! heap_kind {
    ($(#[$meta:meta])* $name:ident, $($ty:ident)|+) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(HeapObject);

        impl $name {
            /// Views `object` as this kind.
            #[inline]
            pub fn cast(object: HeapObject) -> Self {
                debug_assert!(
                    matches!(object.object_type(), $(ObjectType::$ty)|+),
                    "{:?} is not a {}",
                    object.object_type(),
                    stringify!($name)
                );
                $name(object)
            }

            #[inline]
            pub fn as_heap_object(self) -> HeapObject {
                self.0
            }
        }

        impl Deref for $name {
            type Target = HeapObject;

            #[inline]
            fn deref(&self) -> &HeapObject {
                &self.0
            }
        }

        impl From<$name> for HeapObject {
            fn from(value: $name) -> HeapObject {
                value.0
            }
        }
    };
}

const W: usize = WORD_SIZE;

heap_kind!(
    /// A class: layout, superclass and identity of its instances.
    Class,
    Class
);

impl Class {
    pub const SUPER_CLASS_OFFSET: usize = W;
    pub const FORMAT_OFFSET: usize = 2 * W;
    pub const ID_OFFSET: usize = 3 * W;
    pub const CHILD_ID_OFFSET: usize = 4 * W;
    pub const METHODS_OFFSET: usize = 5 * W;
    pub const SIZE: usize = 6 * W;

    /// Writes a class with no methods and ids 0.
    pub fn initialize(
        address: Address,
        meta: Class,
        format: InstanceFormat,
        super_class: Option<Class>,
    ) -> Class {
        let object = HeapObject::from_address(address);
        object.set_class(meta);
        object.at_put(
            Self::SUPER_CLASS_OFFSET,
            super_class.map_or(Object::ZERO, |class| class.as_object()),
        );
        object.at_put(Self::FORMAT_OFFSET, format.as_object());
        object.smi_at_put(Self::ID_OFFSET, 0);
        object.smi_at_put(Self::CHILD_ID_OFFSET, 0);
        object.at_put(Self::METHODS_OFFSET, Object::ZERO);
        Class(object)
    }

    pub fn format(self) -> InstanceFormat {
        InstanceFormat::from_object(self.at(Self::FORMAT_OFFSET))
    }

    pub fn set_format(self, format: InstanceFormat) {
        self.at_put(Self::FORMAT_OFFSET, format.as_object());
    }

    pub fn super_class(self) -> Option<Class> {
        HeapObject::try_cast(self.at(Self::SUPER_CLASS_OFFSET)).map(Class)
    }

    pub fn set_super_class(self, super_class: Option<Class>) {
        self.at_put(
            Self::SUPER_CLASS_OFFSET,
            super_class.map_or(Object::ZERO, |class| class.as_object()),
        );
    }

    pub fn id(self) -> usize {
        self.smi_at(Self::ID_OFFSET)
    }

    pub fn child_id(self) -> usize {
        self.smi_at(Self::CHILD_ID_OFFSET)
    }

    /// Sets the class id and the id of its last subclass.
    pub fn set_ids(self, id: usize, child_id: usize) {
        self.smi_at_put(Self::ID_OFFSET, id);
        self.smi_at_put(Self::CHILD_ID_OFFSET, child_id);
    }

    pub fn methods(self) -> Object {
        self.at(Self::METHODS_OFFSET)
    }

    pub fn set_methods(self, methods: Object) {
        self.at_put(Self::METHODS_OFFSET, methods);
    }

    /// Walks the superclass chain looking for `other`.
    pub fn is_subclass_of(self, other: Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.super_class();
        }
        false
    }
}

heap_kind!(
    /// A plain object with a fixed number of fields.
    Instance,
    Instance
);

impl Instance {
    pub const FLAGS_OFFSET: usize = W;
    pub const FIELDS_OFFSET: usize = 2 * W;

    const IMMUTABLE_BIT: usize = 1;
    const HASH_SHIFT: u32 = 1;

    pub fn allocation_size(fields: usize) -> usize {
        Self::FIELDS_OFFSET + fields * W
    }

    /// Writes an instance of `class` with every field set to `init`.
    pub fn initialize(address: Address, class: Class, init: Object, immutable: bool) -> Instance {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.smi_at_put(Self::FLAGS_OFFSET, usize::from(immutable));
        let fields = class.format().number_of_instance_fields();
        for i in 0..fields {
            object.at_put(Self::FIELDS_OFFSET + i * W, init);
        }
        Instance(object)
    }

    pub fn number_of_fields(self) -> usize {
        self.format().number_of_instance_fields()
    }

    pub fn get_field(self, index: usize) -> Object {
        debug_assert!(index < self.number_of_fields());
        self.at(Self::FIELDS_OFFSET + index * W)
    }

    pub fn set_field(self, index: usize, value: Object) {
        debug_assert!(index < self.number_of_fields());
        self.at_put(Self::FIELDS_OFFSET + index * W, value)
    }

    /// Address of field `index`, for write barriers and root slots.
    pub fn field_address(self, index: usize) -> Address {
        self.address() + Self::FIELDS_OFFSET + index * W
    }

    fn flags(self) -> usize {
        self.smi_at(Self::FLAGS_OFFSET)
    }

    pub fn immutable(self) -> bool {
        self.flags() & Self::IMMUTABLE_BIT != 0
    }

    pub fn set_immutable(self, immutable: bool) {
        let flags = self.flags() & !Self::IMMUTABLE_BIT;
        self.smi_at_put(Self::FLAGS_OFFSET, flags | usize::from(immutable));
    }

    /// Identity hash, 0 until one is assigned.
    pub fn identity_hash(self) -> usize {
        self.flags() >> Self::HASH_SHIFT
    }

    pub fn set_identity_hash(self, hash: usize) {
        let flags = (self.flags() & Self::IMMUTABLE_BIT) | (hash << Self::HASH_SHIFT);
        self.smi_at_put(Self::FLAGS_OFFSET, flags);
    }
}

heap_kind!(
    /// An instance whose class carries the coroutine marker.
    Coroutine,
    Instance
);

impl Coroutine {
    pub const STACK_OFFSET: usize = Instance::FIELDS_OFFSET;
    pub const CALLER_OFFSET: usize = Instance::FIELDS_OFFSET + W;
    pub const SIZE: usize = 4 * W;

    /// Views an instance of a coroutine class.
    pub fn from_instance(instance: Instance) -> Coroutine {
        debug_assert_eq!(instance.format().marker(), Marker::Coroutine);
        Coroutine(instance.as_heap_object())
    }

    pub fn stack(self) -> Object {
        self.at(Self::STACK_OFFSET)
    }

    pub fn set_stack(self, stack: Object) {
        self.at_put(Self::STACK_OFFSET, stack)
    }

    pub fn caller(self) -> Object {
        self.at(Self::CALLER_OFFSET)
    }

    pub fn set_caller(self, caller: Object) {
        self.at_put(Self::CALLER_OFFSET, caller)
    }

    /// Root slot holding the coroutine's stack.
    pub fn stack_address(self) -> Address {
        self.address() + Self::STACK_OFFSET
    }
}

heap_kind!(
    /// Fixed-length array of references.
    Array,
    Array
);

impl Array {
    pub const FLAGS_OFFSET: usize = W;
    pub const LENGTH_OFFSET: usize = 2 * W;
    pub const SIZE: usize = 3 * W;

    pub fn allocation_size(length: usize) -> usize {
        Self::SIZE + length * W
    }

    pub fn initialize(address: Address, class: Class, length: usize, init: Object) -> Array {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.smi_at_put(Self::FLAGS_OFFSET, 0);
        object.smi_at_put(Self::LENGTH_OFFSET, length);
        for i in 0..length {
            object.at_put(Self::SIZE + i * W, init);
        }
        Array(object)
    }

    pub fn length(self) -> usize {
        self.smi_at(Self::LENGTH_OFFSET)
    }

    pub fn get(self, index: usize) -> Object {
        debug_assert!(index < self.length());
        self.at(Self::SIZE + index * W)
    }

    pub fn set(self, index: usize, value: Object) {
        debug_assert!(index < self.length());
        self.at_put(Self::SIZE + index * W, value)
    }

    pub fn element_address(self, index: usize) -> Address {
        self.address() + Self::SIZE + index * W
    }
}

heap_kind!(
    /// Fixed-length array of bytes.
    ByteArray,
    ByteArray
);

impl ByteArray {
    pub const FLAGS_OFFSET: usize = W;
    pub const LENGTH_OFFSET: usize = 2 * W;
    pub const SIZE: usize = 3 * W;

    pub fn allocation_size(length: usize) -> usize {
        Self::SIZE + round_up(length, W)
    }

    /// Writes a zero-filled byte array.
    pub fn initialize(address: Address, class: Class, length: usize) -> ByteArray {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.smi_at_put(Self::FLAGS_OFFSET, 0);
        object.smi_at_put(Self::LENGTH_OFFSET, length);
        for i in 0..round_up(length, W) {
            object.byte_at_put(Self::SIZE + i, 0);
        }
        ByteArray(object)
    }

    pub fn length(self) -> usize {
        self.smi_at(Self::LENGTH_OFFSET)
    }

    pub fn get(self, index: usize) -> u8 {
        debug_assert!(index < self.length());
        self.byte_at(Self::SIZE + index)
    }

    pub fn set(self, index: usize, value: u8) {
        debug_assert!(index < self.length());
        self.byte_at_put(Self::SIZE + index, value)
    }

    pub fn to_vec(self) -> Vec<u8> {
        (0..self.length()).map(|i| self.get(i)).collect()
    }
}

heap_kind!(
    /// UTF-16 string.
    Str,
    String
);

impl Str {
    pub const FLAGS_OFFSET: usize = W;
    pub const LENGTH_OFFSET: usize = 2 * W;
    pub const HASH_OFFSET: usize = 3 * W;
    pub const SIZE: usize = 4 * W;

    pub fn allocation_size(length: usize) -> usize {
        round_up(Self::SIZE + 2 * length, W)
    }

    /// Writes a string of `length` zero code units.
    pub fn initialize(address: Address, class: Class, length: usize) -> Str {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.smi_at_put(Self::FLAGS_OFFSET, 0);
        object.smi_at_put(Self::LENGTH_OFFSET, length);
        object.smi_at_put(Self::HASH_OFFSET, 0);
        let payload = Self::allocation_size(length) - Self::SIZE;
        for i in 0..payload / 2 {
            object.u16_at_put(Self::SIZE + 2 * i, 0);
        }
        Str(object)
    }

    pub fn length(self) -> usize {
        self.smi_at(Self::LENGTH_OFFSET)
    }

    pub fn code_unit(self, index: usize) -> u16 {
        debug_assert!(index < self.length());
        self.u16_at(Self::SIZE + 2 * index)
    }

    pub fn set_code_unit(self, index: usize, unit: u16) {
        debug_assert!(index < self.length());
        self.u16_at_put(Self::SIZE + 2 * index, unit)
    }

    /// Cached hash, 0 until computed.
    pub fn hash(self) -> usize {
        self.smi_at(Self::HASH_OFFSET)
    }

    pub fn set_hash(self, hash: usize) {
        self.smi_at_put(Self::HASH_OFFSET, hash)
    }

    pub fn to_string_lossy(self) -> String {
        let units: Vec<u16> = (0..self.length()).map(|i| self.code_unit(i)).collect();
        String::from_utf16_lossy(&units)
    }
}

heap_kind!(
    /// Integer too large for a Smi.
    LargeInteger,
    LargeInteger
);

impl LargeInteger {
    pub const VALUE_OFFSET: usize = W;
    pub const SIZE: usize = W + round_up(std::mem::size_of::<i64>(), W);

    pub fn initialize(address: Address, class: Class, value: i64) -> LargeInteger {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.u64_at_put(Self::VALUE_OFFSET, value as u64);
        LargeInteger(object)
    }

    pub fn value(self) -> i64 {
        self.u64_at(Self::VALUE_OFFSET) as i64
    }

    pub fn set_value(self, value: i64) {
        self.u64_at_put(Self::VALUE_OFFSET, value as u64)
    }
}

heap_kind!(
    /// Boxed 64-bit float.
    Double,
    Double
);

impl Double {
    pub const VALUE_OFFSET: usize = W;
    pub const SIZE: usize = W + round_up(std::mem::size_of::<f64>(), W);

    pub fn initialize(address: Address, class: Class, value: f64) -> Double {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.u64_at_put(Self::VALUE_OFFSET, value.to_bits());
        Double(object)
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.u64_at(Self::VALUE_OFFSET))
    }
}

heap_kind!(
    /// A mutable cell holding one reference.
    Boxed,
    Boxed
);

impl Boxed {
    pub const VALUE_OFFSET: usize = W;
    pub const SIZE: usize = 2 * W;

    pub fn initialize(address: Address, class: Class, value: Object) -> Boxed {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.at_put(Self::VALUE_OFFSET, value);
        Boxed(object)
    }

    pub fn value(self) -> Object {
        self.at(Self::VALUE_OFFSET)
    }

    pub fn set_value(self, value: Object) {
        self.at_put(Self::VALUE_OFFSET, value)
    }
}

heap_kind!(
    /// Lazy static field initializer.
    Initializer,
    Initializer
);

impl Initializer {
    pub const FUNCTION_OFFSET: usize = W;
    pub const SIZE: usize = 2 * W;

    pub fn initialize(address: Address, class: Class, function: Function) -> Initializer {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.at_put(Self::FUNCTION_OFFSET, function.as_object());
        Initializer(object)
    }

    pub fn function(self) -> Function {
        Function::cast(HeapObject::cast(self.at(Self::FUNCTION_OFFSET)))
    }
}

heap_kind!(
    /// Bytecodes plus a literal pool.
    ///
    /// The literal pool never grows in place; changing its size means
    /// allocating a new function.
    Function,
    Function
);

impl Function {
    pub const BYTECODE_SIZE_OFFSET: usize = W;
    pub const LITERALS_SIZE_OFFSET: usize = 2 * W;
    pub const ARITY_OFFSET: usize = 3 * W;
    pub const SIZE: usize = 4 * W;

    pub fn allocation_size(bytecode_size: usize, literals_size: usize) -> usize {
        round_up(Self::SIZE + round_up(bytecode_size, W) + literals_size * W, W)
    }

    /// Writes a function with the given bytecodes and literals.
    pub fn initialize(
        address: Address,
        class: Class,
        arity: usize,
        bytecodes: &[u8],
        literals: &[Object],
    ) -> Function {
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.smi_at_put(Self::BYTECODE_SIZE_OFFSET, bytecodes.len());
        object.smi_at_put(Self::LITERALS_SIZE_OFFSET, literals.len());
        object.smi_at_put(Self::ARITY_OFFSET, arity);
        let function = Function(object);
        for i in 0..round_up(bytecodes.len(), W) {
            object.byte_at_put(Self::SIZE + i, bytecodes.get(i).copied().unwrap_or(0));
        }
        for (i, literal) in literals.iter().enumerate() {
            function.set_literal_at(i, *literal);
        }
        function
    }

    pub fn bytecode_size(self) -> usize {
        self.smi_at(Self::BYTECODE_SIZE_OFFSET)
    }

    pub fn literals_size(self) -> usize {
        self.smi_at(Self::LITERALS_SIZE_OFFSET)
    }

    pub fn arity(self) -> usize {
        self.smi_at(Self::ARITY_OFFSET)
    }

    pub fn bytecode_at(self, index: usize) -> u8 {
        debug_assert!(index < self.bytecode_size());
        self.byte_at(Self::SIZE + index)
    }

    pub fn set_bytecode_at(self, index: usize, value: u8) {
        debug_assert!(index < self.bytecode_size());
        self.byte_at_put(Self::SIZE + index, value)
    }

    pub(crate) fn literal_address(self, index: usize) -> Address {
        self.address() + Self::SIZE + round_up(self.bytecode_size(), W) + index * W
    }

    pub fn literal_at(self, index: usize) -> Object {
        debug_assert!(index < self.literals_size());
        crate::object::load_slot(self.literal_address(index))
    }

    pub fn set_literal_at(self, index: usize, value: Object) {
        debug_assert!(index < self.literals_size());
        crate::object::store_slot(self.literal_address(index), value)
    }
}

heap_kind!(
    /// Execution stack of a coroutine.
    ///
    /// Stacks form a chain through `next` that a collection rebuilds, so one
    /// root stack leads to every live stack.
    Stack,
    Stack
);

impl Stack {
    pub const FLAGS_OFFSET: usize = W;
    pub const LENGTH_OFFSET: usize = 2 * W;
    pub const TOP_OFFSET: usize = 3 * W;
    pub const NEXT_OFFSET: usize = 4 * W;
    pub const SIZE: usize = 5 * W;

    pub fn allocation_size(length: usize) -> usize {
        Self::SIZE + length * W
    }

    /// Writes a stack with `top` 0, no `next` and every slot set to `init`.
    pub fn initialize(address: Address, class: Class, length: usize, init: Object) -> Stack {
        debug_assert!(length > 0);
        let object = HeapObject::from_address(address);
        object.set_class(class);
        object.smi_at_put(Self::FLAGS_OFFSET, 0);
        object.smi_at_put(Self::LENGTH_OFFSET, length);
        object.smi_at_put(Self::TOP_OFFSET, 0);
        object.at_put(Self::NEXT_OFFSET, Object::ZERO);
        for i in 0..length {
            object.at_put(Self::SIZE + i * W, init);
        }
        Stack(object)
    }

    pub fn length(self) -> usize {
        self.smi_at(Self::LENGTH_OFFSET)
    }

    /// Index of the topmost live slot.
    pub fn top(self) -> usize {
        self.smi_at(Self::TOP_OFFSET)
    }

    pub fn set_top(self, top: usize) {
        debug_assert!(top < self.length());
        self.smi_at_put(Self::TOP_OFFSET, top)
    }

    pub fn get(self, index: usize) -> Object {
        debug_assert!(index < self.length());
        self.at(Self::SIZE + index * W)
    }

    pub fn set(self, index: usize, value: Object) {
        debug_assert!(index < self.length());
        self.at_put(Self::SIZE + index * W, value)
    }

    pub fn next(self) -> Option<Stack> {
        HeapObject::try_cast(self.at(Self::NEXT_OFFSET)).map(Stack)
    }

    pub fn set_next(self, next: Option<Stack>) {
        self.at_put(
            Self::NEXT_OFFSET,
            next.map_or(Object::ZERO, |stack| stack.as_object()),
        )
    }

    /// The raw `next` word, kept as is while chaining.
    pub(crate) fn next_word(self) -> Object {
        self.at(Self::NEXT_OFFSET)
    }

    pub(crate) fn set_next_word(self, next: Object) {
        self.at_put(Self::NEXT_OFFSET, next)
    }
}

heap_kind!(
    /// A reclaimed region linked into a free list.
    FreeListChunk,
    FreeListChunk
);

impl FreeListChunk {
    pub const SIZE_OFFSET: usize = W;
    pub const NEXT_OFFSET: usize = 2 * W;
    pub const SIZE: usize = 3 * W;

    /// Turns `[address, address + size)` into an unlinked free chunk.
    pub fn create(address: Address, size: usize) -> FreeListChunk {
        debug_assert!(size >= Self::SIZE);
        let object = HeapObject::from_address(address);
        object.set_class(free_list_chunk_class());
        object.word_at_put(Self::SIZE_OFFSET, size);
        object.word_at_put(Self::NEXT_OFFSET, 0);
        FreeListChunk(object)
    }

    pub fn size(self) -> usize {
        self.word_at(Self::SIZE_OFFSET)
    }

    pub fn next(self) -> Option<FreeListChunk> {
        match self.word_at(Self::NEXT_OFFSET) {
            0 => None,
            next => Some(FreeListChunk(HeapObject::from_address(Address::new(next)))),
        }
    }

    pub fn set_next(self, next: Option<FreeListChunk>) {
        self.word_at_put(
            Self::NEXT_OFFSET,
            next.map_or(0, |chunk| chunk.address().raw()),
        )
    }
}

heap_kind!(
    /// A single word of dead space.
    OneWordFiller,
    OneWordFiller
);

impl OneWordFiller {
    pub const SIZE: usize = W;

    pub fn create(address: Address) -> OneWordFiller {
        let object = HeapObject::from_address(address);
        object.set_class(one_word_filler_class());
        OneWordFiller(object)
    }
}

heap_kind!(
    /// Header of an old-space region allocated while tracking promotions.
    ///
    /// `[start, end)` is promoted memory not yet scanned for new-space
    /// pointers.
    PromotedTrack,
    PromotedTrack
);

impl PromotedTrack {
    pub const NEXT_OFFSET: usize = W;
    pub const END_OFFSET: usize = 2 * W;
    pub const HEADER_SIZE: usize = 3 * W;

    pub fn initialize(
        next: Option<PromotedTrack>,
        location: Address,
        end: Address,
    ) -> PromotedTrack {
        debug_assert!(end - location >= Self::HEADER_SIZE);
        let object = HeapObject::from_address(location);
        object.set_class(promoted_track_class());
        let track = PromotedTrack(object);
        track.set_next(next);
        track.set_end(end);
        track
    }

    /// First byte after the header.
    pub fn start(self) -> Address {
        self.address() + Self::HEADER_SIZE
    }

    pub fn end(self) -> Address {
        Address::new(self.word_at(Self::END_OFFSET))
    }

    pub fn set_end(self, end: Address) {
        self.word_at_put(Self::END_OFFSET, end.raw())
    }

    pub fn next(self) -> Option<PromotedTrack> {
        match self.word_at(Self::NEXT_OFFSET) {
            0 => None,
            next => Some(PromotedTrack(HeapObject::from_address(Address::new(next)))),
        }
    }

    pub fn set_next(self, next: Option<PromotedTrack>) {
        self.word_at_put(
            Self::NEXT_OFFSET,
            next.map_or(0, |track| track.address().raw()),
        )
    }

    /// Replaces the header with fillers, leaving the promoted objects as
    /// ordinary heap.
    pub fn zap(self) {
        let start = self.address();
        for i in 0..Self::HEADER_SIZE / W {
            OneWordFiller::create(start.word(i));
        }
    }
}

/// Off-heap classes of the heap-structure objects, plus their meta class.
struct StaticClasses {
    words: Box<[usize]>,
}

const META_CLASS_INDEX: usize = 0;
const FREE_LIST_CHUNK_CLASS_INDEX: usize = 1;
const ONE_WORD_FILLER_CLASS_INDEX: usize = 2;
const PROMOTED_TRACK_CLASS_INDEX: usize = 3;

impl StaticClasses {
    fn new() -> Self {
        let formats = [
            InstanceFormat::class_format(),
            InstanceFormat::free_list_chunk_format(),
            InstanceFormat::one_word_filler_format(),
            InstanceFormat::promoted_track_format(),
        ];
        let class_words = Class::SIZE / W;
        let mut words = vec![0usize; formats.len() * class_words].into_boxed_slice();
        let meta = Object::from_address(Address::from_ptr(words.as_ptr())).raw();
        for (i, format) in formats.iter().enumerate() {
            let class = &mut words[i * class_words..(i + 1) * class_words];
            class[0] = meta;
            class[1] = Object::ZERO.raw();
            class[2] = format.raw();
            class[3] = Object::from_smi(i as isize).raw();
            class[4] = Object::from_smi(i as isize).raw();
            class[5] = Object::ZERO.raw();
        }
        StaticClasses { words }
    }

    fn class(&self, index: usize) -> Class {
        let base = Address::from_ptr(self.words.as_ptr());
        Class(HeapObject::from_address(base + index * Class::SIZE))
    }
}

static STATIC_CLASSES: Lazy<StaticClasses> = Lazy::new(StaticClasses::new);

/// The class of every class, including itself.
pub fn meta_class() -> Class {
    STATIC_CLASSES.class(META_CLASS_INDEX)
}

pub fn free_list_chunk_class() -> Class {
    STATIC_CLASSES.class(FREE_LIST_CHUNK_CLASS_INDEX)
}

pub fn one_word_filler_class() -> Class {
    STATIC_CLASSES.class(ONE_WORD_FILLER_CLASS_INDEX)
}

pub fn promoted_track_class() -> Class {
    STATIC_CLASSES.class(PROMOTED_TRACK_CLASS_INDEX)
}
