//! Raw heap addresses and word arithmetic.
//!
//! [`Address`] is the only type in the runtime that dereferences raw memory.
//! Everything above it (objects, spaces, collectors) goes through these
//! accessors, so a move away from address-embedding references stays local
//! to this module.

#![allow(unsafe_code)]

use std::fmt;
use std::ops::{Add, Sub};

/// Size of a machine word in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// log2 of [`WORD_SIZE`].
pub const WORD_SHIFT: u32 = WORD_SIZE.trailing_zeros();

/// Rounds `value` up to a multiple of `alignment` (a power of two).
#[inline]
pub const fn round_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Rounds `value` down to a multiple of `alignment` (a power of two).
#[inline]
pub const fn round_down(value: usize, alignment: usize) -> usize {
    value & !(alignment - 1)
}

/// Returns true if `value` is a multiple of `alignment` (a power of two).
#[inline]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    value & (alignment - 1) == 0
}

/// 1-based index of the highest set bit; 0 for 0.
///
/// ```
/// use core_types::highest_bit;
///
/// assert_eq!(highest_bit(0), 0);
/// assert_eq!(highest_bit(1), 1);
/// assert_eq!(highest_bit(24), 5);
/// ```
#[inline]
pub const fn highest_bit(value: usize) -> u32 {
    usize::BITS - value.leading_zeros()
}

/// An untagged, byte-granular address into raw memory.
///
/// Arithmetic is plain integer arithmetic. The `load_*`/`store_*` accessors
/// are `unsafe`: the caller promises the address is valid, suitably aligned
/// memory owned by the heap.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Address(usize);

impl Address {
    /// The null address.
    pub const NULL: Address = Address(0);

    /// Wraps a raw integer address.
    #[inline]
    pub const fn new(raw: usize) -> Self {
        Address(raw)
    }

    /// Wraps the address of a raw pointer.
    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Address(ptr as usize)
    }

    /// Returns the raw integer value.
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Returns true for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the address `bytes` bytes further on.
    #[inline]
    pub const fn offset(self, bytes: usize) -> Self {
        Address(self.0 + bytes)
    }

    /// Returns the address of the `index`th word after this one.
    #[inline]
    pub const fn word(self, index: usize) -> Self {
        Address(self.0 + index * WORD_SIZE)
    }

    /// Number of bytes from `base` up to this address.
    #[inline]
    pub const fn distance_from(self, base: Address) -> usize {
        self.0 - base.0
    }

    /// Returns true if the address is a multiple of `alignment`.
    #[inline]
    pub const fn is_aligned_to(self, alignment: usize) -> bool {
        is_aligned(self.0, alignment)
    }

    /// Returns the address as a mutable pointer.
    #[inline]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Reads the word stored at this address.
    ///
    /// # Safety
    ///
    /// The address must be word-aligned and point to readable memory.
    #[inline]
    pub unsafe fn load_word(self) -> usize {
        debug_assert!(self.is_aligned_to(WORD_SIZE));
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::read(self.0 as *const usize) }
    }

    /// Writes `value` to the word at this address.
    ///
    /// # Safety
    ///
    /// The address must be word-aligned and point to writable memory.
    #[inline]
    pub unsafe fn store_word(self, value: usize) {
        debug_assert!(self.is_aligned_to(WORD_SIZE));
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::write(self.0 as *mut usize, value) }
    }

    /// Reads one byte.
    ///
    /// # Safety
    ///
    /// The address must point to readable memory.
    #[inline]
    pub unsafe fn load_u8(self) -> u8 {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::read(self.0 as *const u8) }
    }

    /// Writes one byte.
    ///
    /// # Safety
    ///
    /// The address must point to writable memory.
    #[inline]
    pub unsafe fn store_u8(self, value: u8) {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::write(self.0 as *mut u8, value) }
    }

    /// Reads a 16-bit unit.
    ///
    /// # Safety
    ///
    /// The address must be 2-byte aligned and readable.
    #[inline]
    pub unsafe fn load_u16(self) -> u16 {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::read(self.0 as *const u16) }
    }

    /// Writes a 16-bit unit.
    ///
    /// # Safety
    ///
    /// The address must be 2-byte aligned and writable.
    #[inline]
    pub unsafe fn store_u16(self, value: u16) {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::write(self.0 as *mut u16, value) }
    }

    /// Reads a 64-bit payload. Only word alignment is required.
    ///
    /// # Safety
    ///
    /// The eight bytes at the address must be readable.
    #[inline]
    pub unsafe fn load_u64(self) -> u64 {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::read_unaligned(self.0 as *const u64) }
    }

    /// Writes a 64-bit payload. Only word alignment is required.
    ///
    /// # Safety
    ///
    /// The eight bytes at the address must be writable.
    #[inline]
    pub unsafe fn store_u64(self, value: u64) {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::write_unaligned(self.0 as *mut u64, value) }
    }

    /// Copies `bytes` bytes from `source` to this address.
    ///
    /// # Safety
    ///
    /// Both ranges must be valid and must not overlap.
    #[inline]
    pub unsafe fn copy_from(self, source: Address, bytes: usize) {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::copy_nonoverlapping(source.0 as *const u8, self.0 as *mut u8, bytes) }
    }

    /// Fills `bytes` bytes starting at this address with `value`.
    ///
    /// # Safety
    ///
    /// The range must be valid, writable memory.
    #[inline]
    pub unsafe fn fill(self, value: u8, bytes: usize) {
        // SAFETY: guaranteed by the caller.
        unsafe { std::ptr::write_bytes(self.0 as *mut u8, value, bytes) }
    }
}

impl Add<usize> for Address {
    type Output = Address;

    fn add(self, bytes: usize) -> Address {
        Address(self.0 + bytes)
    }
}

impl Sub<usize> for Address {
    type Output = Address;

    fn sub(self, bytes: usize) -> Address {
        Address(self.0 - bytes)
    }
}

impl Sub<Address> for Address {
    type Output = usize;

    fn sub(self, other: Address) -> usize {
        self.0 - other.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
