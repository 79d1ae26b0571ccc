//! Page-granular arena allocator.
//!
//! The object memory never talks to the OS allocator for chunks. It carves
//! them out of a small number of pre-reserved arenas, each tracked with one
//! state byte per page.
//!
//! # Overview
//!
//! - [`PageAllocator`] - Up to [`MAX_ARENAS`] arenas, first-fit page runs
//! - [`os::reserve`] - Reserves page-aligned memory from the OS for arenas
//! - [`pages_for_bytes`] - Byte to page conversion
//!
//! # Examples
//!
//! ```
//! use page_allocator::{os, PageAllocator, PAGE_SIZE};
//!
//! let region = os::reserve(16 * PAGE_SIZE).unwrap();
//! let mut allocator = PageAllocator::new();
//! let bit = allocator.add_arena("heap", region.start(), region.size(), None);
//! assert_eq!(bit, 1);
//!
//! let pages = allocator.allocate_pages(2, bit).unwrap();
//! allocator.free_pages(pages, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod os;

use core_types::{fatal, round_down, round_up, Address, FatalError};
use tracing::{debug, trace};

/// Size of one page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SIZE_SHIFT: u32 = PAGE_SIZE.trailing_zeros();

/// Number of arena slots.
pub const MAX_ARENAS: usize = 3;

/// Bitmap selecting only the first arena added.
pub const DEFAULT_ARENAS: u32 = 0x1;

/// Number of pages needed to hold `bytes` bytes.
#[inline]
pub const fn pages_for_bytes(bytes: usize) -> usize {
    round_up(bytes, PAGE_SIZE) / PAGE_SIZE
}

const PAGE_FREE: u8 = 0;
const PAGE_IN_USE: u8 = 1;

/// Where an arena keeps its page states.
#[derive(Debug)]
enum PageMap {
    /// Caller-supplied table, at least one byte per page.
    External(Box<[u8]>),
    /// Table carved from the first pages of the arena itself.
    InArena(Address),
}

/// One contiguous range of pages.
#[derive(Debug)]
struct Arena {
    name: &'static str,
    pages: usize,
    base: Address,
    map: PageMap,
}

#[allow(unsafe_code)]
impl Arena {
    fn new(name: &'static str, start: Address, size: usize, map: Option<Box<[u8]>>) -> Self {
        let first = round_up(start.raw(), PAGE_SIZE);
        let end = round_down(start.raw() + size, PAGE_SIZE);
        let mut pages = end.saturating_sub(first) >> PAGE_SIZE_SHIFT;

        let (base, map) = match map {
            Some(mut table) if table.len() >= pages => {
                table[..pages].fill(PAGE_FREE);
                (Address::new(first), PageMap::External(table))
            }
            _ => {
                pages -= pages_for_bytes(pages);
                let table = Address::new(first);
                // SAFETY: the table occupies the arena's leading pages, which
                // the caller handed over together with the rest of the range.
                unsafe { table.fill(PAGE_FREE, pages) }
                (
                    Address::new(round_up(first + pages, PAGE_SIZE)),
                    PageMap::InArena(table),
                )
            }
        };

        debug!(event = "arena_added", name = name, base = %base, pages = pages);
        Arena {
            name,
            pages,
            base,
            map,
        }
    }

    fn state(&self, index: usize) -> u8 {
        debug_assert!(index < self.pages);
        match &self.map {
            PageMap::External(table) => table[index],
            // SAFETY: index < pages and the table holds `pages` bytes.
            PageMap::InArena(table) => unsafe { table.offset(index).load_u8() },
        }
    }

    fn set_states(&mut self, index: usize, count: usize, state: u8) {
        debug_assert!(index + count <= self.pages);
        match &mut self.map {
            PageMap::External(table) => table[index..index + count].fill(state),
            // SAFETY: the range lies inside the in-arena table.
            PageMap::InArena(table) => unsafe { table.offset(index).fill(state, count) },
        }
    }

    fn contains_page_at(&self, start: Address) -> bool {
        self.base <= start && start < self.base + (self.pages << PAGE_SIZE_SHIFT)
    }

    fn allocate_pages(&mut self, pages: usize) -> Option<Address> {
        if pages == 0 || pages > self.pages {
            return None;
        }
        let mut i = 0;
        while i < self.pages - pages + 1 {
            match (0..pages).find(|&j| self.state(i + j) != PAGE_FREE) {
                // Skip past the page in use.
                Some(j) => i += j + 1,
                None => {
                    self.set_states(i, pages, PAGE_IN_USE);
                    let result = self.base + (i << PAGE_SIZE_SHIFT);
                    trace!(event = "pages_allocated", arena = self.name, start = %result, pages = pages);
                    return Some(result);
                }
            }
        }
        None
    }

    fn free_pages(&mut self, start: Address, pages: usize) {
        let index = (start - self.base) >> PAGE_SIZE_SHIFT;
        for i in index..index + pages {
            assert!(
                self.state(i) != PAGE_FREE,
                "page {} of arena {} freed twice",
                i,
                self.name
            );
        }
        self.set_states(index, pages, PAGE_FREE);
        trace!(event = "pages_freed", arena = self.name, start = %start, pages = pages);
    }
}

/// Hands out runs of whole pages from up to [`MAX_ARENAS`] arenas.
///
/// Arenas are selected by bit: the first arena added is bit `1 << 0`, the
/// second `1 << 1` and so on. Allocation tries the selected arenas in order
/// and takes the first fitting run.
#[derive(Debug, Default)]
pub struct PageAllocator {
    arenas: [Option<Arena>; MAX_ARENAS],
}

impl PageAllocator {
    /// Creates an allocator with no arenas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the memory range `[start, start + size)` as an arena.
    ///
    /// The range is trimmed inward to page boundaries. If `map` holds at
    /// least one byte per page it tracks page states; otherwise the leading
    /// pages of the arena are given up for the table.
    ///
    /// # Returns
    ///
    /// The bit selecting this arena in [`allocate_pages`](Self::allocate_pages).
    ///
    /// Adding more than [`MAX_ARENAS`] arenas is fatal.
    pub fn add_arena(
        &mut self,
        name: &'static str,
        start: Address,
        size: usize,
        map: Option<Box<[u8]>>,
    ) -> u32 {
        match self.arenas.iter().position(Option::is_none) {
            Some(i) => {
                self.arenas[i] = Some(Arena::new(name, start, size, map));
                1 << i
            }
            None => fatal(FatalError::TooManyArenas),
        }
    }

    /// Allocates `pages` contiguous pages from the arenas in `arenas_bitmap`.
    ///
    /// Returns `None` when no selected arena has a long enough free run, or
    /// when `pages` is zero.
    pub fn allocate_pages(&mut self, pages: usize, arenas_bitmap: u32) -> Option<Address> {
        self.arenas
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| arenas_bitmap & (1 << i) != 0)
            .filter_map(|(_, arena)| arena.as_mut())
            .find_map(|arena| arena.allocate_pages(pages))
    }

    /// Returns `pages` pages starting at `start`.
    ///
    /// Freeing pages no arena owns is fatal.
    pub fn free_pages(&mut self, start: Address, pages: usize) {
        debug_assert!(start.is_aligned_to(PAGE_SIZE));
        match self
            .arenas
            .iter_mut()
            .flatten()
            .find(|arena| arena.contains_page_at(start))
        {
            Some(arena) => arena.free_pages(start, pages),
            None => fatal(FatalError::FreeOfUnallocatedPages),
        }
    }

    /// Returns true if the page at `address` is currently handed out.
    pub fn is_page_allocated(&self, address: Address) -> bool {
        self.arenas
            .iter()
            .flatten()
            .find(|arena| arena.contains_page_at(address))
            .map(|arena| arena.state((address - arena.base) >> PAGE_SIZE_SHIFT) != PAGE_FREE)
            .unwrap_or(false)
    }

    /// Usable bounds `(base, pages)` of the arena selected by `bit`.
    pub fn arena_bounds(&self, bit: u32) -> Option<(Address, usize)> {
        let index = bit.trailing_zeros() as usize;
        self.arenas
            .get(index)
            .and_then(Option::as_ref)
            .map(|arena| (arena.base, arena.pages))
    }
}
