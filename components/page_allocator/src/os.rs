//! OS page reservation.
//!
//! The only code in the runtime that asks the operating system for memory.
//! Regions are anonymous, zero-filled and page aligned; they go back to the
//! OS when the [`Region`] is dropped.

#![allow(unsafe_code)]

use crate::PAGE_SIZE;
use core_types::{round_up, Address};
use tracing::{debug, warn};

/// A page-aligned block of memory reserved from the OS.
#[derive(Debug)]
pub struct Region {
    start: Address,
    size: usize,
}

// SAFETY: a Region is an exclusively owned block of memory with no
// thread-affine state; moving the handle between threads is fine.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// First byte of the region.
    pub fn start(&self) -> Address {
        self.start
    }

    /// Size in bytes, a multiple of [`PAGE_SIZE`].
    pub fn size(&self) -> usize {
        self.size
    }

    /// First byte past the region.
    pub fn end(&self) -> Address {
        self.start + self.size
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        release_raw(self.start, self.size);
        debug!(event = "region_released", start = %self.start, size = self.size);
    }
}

/// Reserves at least `bytes` bytes of zeroed, page-aligned memory.
///
/// Returns `None` when the OS refuses.
pub fn reserve(bytes: usize) -> Option<Region> {
    let size = round_up(bytes.max(1), PAGE_SIZE);
    let start = reserve_raw(size)?;
    debug_assert!(start.is_aligned_to(PAGE_SIZE));
    debug!(event = "region_reserved", start = %start, size = size);
    Some(Region { start, size })
}

/// Returns `region` to the OS. Equivalent to dropping it.
pub fn release(region: Region) {
    drop(region);
}

#[cfg(unix)]
fn reserve_raw(size: usize) -> Option<Address> {
    // SAFETY: an anonymous private mapping has no preconditions; failure is
    // reported as MAP_FAILED and checked below.
    let memory = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if memory == libc::MAP_FAILED {
        warn!(event = "mmap_failed", size = size);
        return None;
    }
    Some(Address::from_ptr(memory as *const u8))
}

#[cfg(unix)]
fn release_raw(start: Address, size: usize) {
    // SAFETY: the range was obtained from mmap with exactly this size.
    let rc = unsafe { libc::munmap(start.as_mut_ptr::<libc::c_void>(), size) };
    if rc != 0 {
        warn!(event = "munmap_failed", start = %start, size = size);
    }
}

#[cfg(not(unix))]
fn reserve_raw(size: usize) -> Option<Address> {
    let layout = std::alloc::Layout::from_size_align(size, PAGE_SIZE).ok()?;
    // SAFETY: the layout has a non-zero size.
    let memory = unsafe { std::alloc::alloc_zeroed(layout) };
    if memory.is_null() {
        warn!(event = "alloc_failed", size = size);
        return None;
    }
    Some(Address::from_ptr(memory))
}

#[cfg(not(unix))]
fn release_raw(start: Address, size: usize) {
    if let Ok(layout) = std::alloc::Layout::from_size_align(size, PAGE_SIZE) {
        // SAFETY: allocated in reserve_raw with the same layout.
        unsafe { std::alloc::dealloc(start.as_mut_ptr::<u8>(), layout) };
    }
}
