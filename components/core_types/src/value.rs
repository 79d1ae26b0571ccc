//! Tagged object words.
//!
//! Every value the runtime passes around is one machine word whose low bits
//! say what it is:
//!
//! - `...0`  small integer (Smi), value stored in the upper bits
//! - `..01`  heap object, the word is the object's address plus one
//! - `..11`  failure sentinel, the kind stored above the tag
//!
//! Heap objects are word aligned, so the tag never collides with address
//! bits.

use crate::address::Address;
use crate::error::FailureKind;
use std::fmt;

/// Which of the three word variants a tagged word holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Small integer, no storage.
    Smi,
    /// Reference to heap storage.
    HeapObject,
    /// In-band error sentinel.
    Failure,
}

/// Tag constants for small integers.
pub struct Smi;

impl Smi {
    /// Tag value of a Smi.
    pub const TAG: usize = 0;
    /// Number of tag bits.
    pub const TAG_SIZE: u32 = 1;
    /// Mask selecting the tag bits.
    pub const TAG_MASK: usize = (1 << Self::TAG_SIZE) - 1;
    /// Largest representable value.
    pub const MAX_VALUE: isize = isize::MAX >> Self::TAG_SIZE;
    /// Smallest representable value.
    pub const MIN_VALUE: isize = isize::MIN >> Self::TAG_SIZE;

    /// Returns true if `value` fits in a Smi.
    #[inline]
    pub const fn is_valid(value: isize) -> bool {
        value >= Self::MIN_VALUE && value <= Self::MAX_VALUE
    }
}

/// Tag constants for heap object references.
pub struct HeapTag;

impl HeapTag {
    /// Tag value of a heap object reference.
    pub const TAG: usize = 1;
    /// Number of tag bits.
    pub const TAG_SIZE: u32 = 2;
    /// Mask selecting the tag bits.
    pub const TAG_MASK: usize = (1 << Self::TAG_SIZE) - 1;
    /// Reserved bit just above the tag marking new-space residency.
    pub const NEW_SPACE_BIT: usize = Self::TAG_MASK + 1;
}

/// Tag constants for failure sentinels.
pub struct Failure;

impl Failure {
    /// Tag value of a failure.
    pub const TAG: usize = 3;
    /// Number of tag bits.
    pub const TAG_SIZE: u32 = 2;
    /// Mask selecting the tag bits.
    pub const TAG_MASK: usize = (1 << Self::TAG_SIZE) - 1;

    /// Builds the failure word for `kind`.
    #[inline]
    pub const fn word(kind: FailureKind) -> Object {
        Object(((kind as usize) << Self::TAG_SIZE) | Self::TAG)
    }

    /// The retry-after-GC sentinel.
    #[inline]
    pub const fn retry_after_gc() -> Object {
        Self::word(FailureKind::RetryAfterGc)
    }
}

/// A tagged machine word.
///
/// # Examples
///
/// ```
/// use core_types::Object;
///
/// let seven = Object::from_smi(7);
/// assert!(seven.is_smi());
/// assert_eq!(seven.smi_value(), 7);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Object(usize);

impl Object {
    /// Smi zero. Doubles as the chunk-end sentinel.
    pub const ZERO: Object = Object(0);

    /// Reinterprets a raw word as a tagged object.
    ///
    /// Any word is a well-formed `Object`; dereferencing a heap reference is
    /// what needs a valid heap behind it, and that goes through `Address`.
    #[inline]
    pub const fn from_raw(word: usize) -> Self {
        Object(word)
    }

    /// Returns the raw word.
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Encodes a small integer. `value` must satisfy [`Smi::is_valid`].
    #[inline]
    pub const fn from_smi(value: isize) -> Self {
        debug_assert!(Smi::is_valid(value));
        Object((value << Smi::TAG_SIZE) as usize)
    }

    /// Tags a word-aligned heap address.
    #[inline]
    pub fn from_address(address: Address) -> Self {
        debug_assert!(address.raw() & HeapTag::TAG_MASK == 0);
        Object(address.raw() + HeapTag::TAG)
    }

    /// Decodes the tag.
    #[inline]
    pub const fn tag(self) -> Tag {
        if self.0 & Smi::TAG_MASK == Smi::TAG {
            Tag::Smi
        } else if self.0 & HeapTag::TAG_MASK == HeapTag::TAG {
            Tag::HeapObject
        } else {
            Tag::Failure
        }
    }

    /// Returns true for small integers.
    #[inline]
    pub const fn is_smi(self) -> bool {
        self.0 & Smi::TAG_MASK == Smi::TAG
    }

    /// Returns true for heap object references.
    #[inline]
    pub const fn is_heap_object(self) -> bool {
        self.0 & HeapTag::TAG_MASK == HeapTag::TAG
    }

    /// Returns true for failure sentinels.
    #[inline]
    pub const fn is_failure(self) -> bool {
        self.0 & Failure::TAG_MASK == Failure::TAG
    }

    /// Decodes a small integer.
    #[inline]
    pub const fn smi_value(self) -> isize {
        debug_assert!(self.is_smi());
        (self.0 as isize) >> Smi::TAG_SIZE
    }

    /// Returns the untagged address of a heap reference.
    #[inline]
    pub fn heap_address(self) -> Address {
        debug_assert!(self.is_heap_object());
        Address::new(self.0 - HeapTag::TAG)
    }

    /// Decodes a failure sentinel's kind.
    #[inline]
    pub fn failure_kind(self) -> Option<FailureKind> {
        if !self.is_failure() {
            return None;
        }
        FailureKind::from_code(self.0 >> Failure::TAG_SIZE)
    }

    /// Tests the reserved new-space bit above the heap tag.
    #[inline]
    pub const fn has_new_space_bit(self) -> bool {
        self.is_heap_object() && self.0 & HeapTag::NEW_SPACE_BIT != 0
    }
}

impl Default for Object {
    fn default() -> Self {
        Object::ZERO
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Tag::Smi => f.debug_tuple("Smi").field(&self.smi_value()).finish(),
            Tag::HeapObject => f.debug_tuple("HeapObject").field(&self.heap_address()).finish(),
            Tag::Failure => f.debug_tuple("Failure").field(&self.failure_kind()).finish(),
        }
    }
}
