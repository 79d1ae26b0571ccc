//! Instance formats.
//!
//! A class describes its instances with one packed word, stored in the
//! class as a Smi so the collectors never mistake it for a pointer:
//!
//! ```text
//!  bit  0        Smi tag (always 0)
//!  bits 1..4     object type
//!  bit  5        has variable part
//!  bit  6        only pointers in fixed part
//!  bits 7..9     marker
//!  bit  10       complex object (has a flags word)
//!  bits 11..30   fixed size in words
//! ```

use core_types::{Object, WORD_SIZE};

/// Heap object kinds selected by an [`InstanceFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    Class = 0,
    Instance = 1,
    String = 2,
    Array = 3,
    Function = 4,
    LargeInteger = 5,
    ByteArray = 6,
    Double = 7,
    Boxed = 8,
    Stack = 9,
    Initializer = 10,
    FreeListChunk = 11,
    OneWordFiller = 12,
    PromotedTrack = 13,
    /// Smis and failures. Never instantiated.
    Immediate = 15,
}

impl ObjectType {
    fn from_code(code: usize) -> Option<Self> {
        Some(match code {
            0 => ObjectType::Class,
            1 => ObjectType::Instance,
            2 => ObjectType::String,
            3 => ObjectType::Array,
            4 => ObjectType::Function,
            5 => ObjectType::LargeInteger,
            6 => ObjectType::ByteArray,
            7 => ObjectType::Double,
            8 => ObjectType::Boxed,
            9 => ObjectType::Stack,
            10 => ObjectType::Initializer,
            11 => ObjectType::FreeListChunk,
            12 => ObjectType::OneWordFiller,
            13 => ObjectType::PromotedTrack,
            15 => ObjectType::Immediate,
            _ => return None,
        })
    }

    /// Types that only exist to keep chunks iterable.
    pub fn is_heap_structure(self) -> bool {
        matches!(
            self,
            ObjectType::FreeListChunk | ObjectType::OneWordFiller | ObjectType::PromotedTrack
        )
    }
}

/// Instance markers for the well-known singletons and special instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Marker {
    Null = 0,
    True = 1,
    False = 2,
    Coroutine = 3,
    Port = 4,
    Foreign = 5,
    None = 7,
}

impl Marker {
    fn from_code(code: usize) -> Self {
        match code {
            0 => Marker::Null,
            1 => Marker::True,
            2 => Marker::False,
            3 => Marker::Coroutine,
            4 => Marker::Port,
            5 => Marker::Foreign,
            _ => Marker::None,
        }
    }
}

const TYPE_SHIFT: u32 = 1;
const TYPE_MASK: usize = 0xf;
const HAS_VARIABLE_PART_BIT: usize = 1 << 5;
const ONLY_POINTERS_IN_FIXED_PART_BIT: usize = 1 << 6;
const MARKER_SHIFT: u32 = 7;
const MARKER_MASK: usize = 0x7;
const COMPLEX_BIT: usize = 1 << 10;
const FIXED_SIZE_SHIFT: u32 = 11;
const FIXED_SIZE_MASK: usize = (1 << 20) - 1;

/// Packed layout description of a class's instances.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceFormat(usize);

impl InstanceFormat {
    /// Packs a format. `fixed_size` is in bytes and must be word aligned.
    pub const fn new(
        object_type: ObjectType,
        fixed_size: usize,
        has_variable_part: bool,
        only_pointers_in_fixed_part: bool,
        complex: bool,
        marker: Marker,
    ) -> Self {
        let words = fixed_size / WORD_SIZE;
        let mut raw = ((object_type as usize) << TYPE_SHIFT)
            | ((marker as usize) << MARKER_SHIFT)
            | ((words & FIXED_SIZE_MASK) << FIXED_SIZE_SHIFT);
        if has_variable_part {
            raw |= HAS_VARIABLE_PART_BIT;
        }
        if only_pointers_in_fixed_part {
            raw |= ONLY_POINTERS_IN_FIXED_PART_BIT;
        }
        if complex {
            raw |= COMPLEX_BIT;
        }
        InstanceFormat(raw)
    }

    /// Decodes the format stored in a class's format slot.
    pub fn from_object(object: Object) -> Self {
        debug_assert!(object.is_smi());
        InstanceFormat(object.raw())
    }

    /// The Smi word stored in a class.
    pub fn as_object(self) -> Object {
        Object::from_raw(self.0)
    }

    pub fn raw(self) -> usize {
        self.0
    }

    pub fn object_type(self) -> ObjectType {
        let code = (self.0 >> TYPE_SHIFT) & TYPE_MASK;
        debug_assert!(ObjectType::from_code(code).is_some());
        ObjectType::from_code(code).unwrap_or(ObjectType::Immediate)
    }

    /// Fixed part size in bytes, header included.
    pub fn fixed_size(self) -> usize {
        ((self.0 >> FIXED_SIZE_SHIFT) & FIXED_SIZE_MASK) * WORD_SIZE
    }

    pub fn has_variable_part(self) -> bool {
        self.0 & HAS_VARIABLE_PART_BIT != 0
    }

    pub fn only_pointers_in_fixed_part(self) -> bool {
        self.0 & ONLY_POINTERS_IN_FIXED_PART_BIT != 0
    }

    pub fn is_complex(self) -> bool {
        self.0 & COMPLEX_BIT != 0
    }

    pub fn marker(self) -> Marker {
        Marker::from_code((self.0 >> MARKER_SHIFT) & MARKER_MASK)
    }

    /// Number of instance fields for [`ObjectType::Instance`] formats.
    pub fn number_of_instance_fields(self) -> usize {
        debug_assert_eq!(self.object_type(), ObjectType::Instance);
        (self.fixed_size() - 2 * WORD_SIZE) / WORD_SIZE
    }

    pub const fn class_format() -> Self {
        Self::new(ObjectType::Class, 6 * WORD_SIZE, false, true, false, Marker::None)
    }

    pub const fn instance_format(fields: usize, marker: Marker) -> Self {
        Self::new(
            ObjectType::Instance,
            (2 + fields) * WORD_SIZE,
            false,
            true,
            true,
            marker,
        )
    }

    pub const fn string_format() -> Self {
        Self::new(ObjectType::String, 4 * WORD_SIZE, true, true, true, Marker::None)
    }

    pub const fn array_format() -> Self {
        Self::new(ObjectType::Array, 3 * WORD_SIZE, true, false, true, Marker::None)
    }

    pub const fn function_format() -> Self {
        Self::new(ObjectType::Function, 4 * WORD_SIZE, true, false, false, Marker::None)
    }

    pub const fn large_integer_format() -> Self {
        Self::new(ObjectType::LargeInteger, WORD_SIZE, true, true, false, Marker::None)
    }

    pub const fn byte_array_format() -> Self {
        Self::new(ObjectType::ByteArray, 3 * WORD_SIZE, true, true, true, Marker::None)
    }

    pub const fn double_format() -> Self {
        Self::new(ObjectType::Double, WORD_SIZE, true, true, false, Marker::None)
    }

    pub const fn boxed_format() -> Self {
        Self::new(ObjectType::Boxed, 2 * WORD_SIZE, false, true, false, Marker::None)
    }

    pub const fn stack_format() -> Self {
        Self::new(ObjectType::Stack, 5 * WORD_SIZE, true, false, true, Marker::None)
    }

    pub const fn initializer_format() -> Self {
        Self::new(ObjectType::Initializer, 2 * WORD_SIZE, false, true, false, Marker::None)
    }

    pub const fn free_list_chunk_format() -> Self {
        Self::new(ObjectType::FreeListChunk, 3 * WORD_SIZE, true, false, false, Marker::None)
    }

    pub const fn one_word_filler_format() -> Self {
        Self::new(ObjectType::OneWordFiller, WORD_SIZE, false, false, false, Marker::None)
    }

    pub const fn promoted_track_format() -> Self {
        Self::new(ObjectType::PromotedTrack, 3 * WORD_SIZE, true, false, false, Marker::None)
    }
}

impl std::fmt::Debug for InstanceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceFormat")
            .field("type", &self.object_type())
            .field("fixed_size", &self.fixed_size())
            .field("variable", &self.has_variable_part())
            .field("only_pointers", &self.only_pointers_in_fixed_part())
            .field("marker", &self.marker())
            .field("complex", &self.is_complex())
            .finish()
    }
}
