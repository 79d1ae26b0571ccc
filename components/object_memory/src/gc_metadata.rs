//! Out-of-heap tables the collectors need.
//!
//! Every heap chunk is carved from one contiguous arena, so the metadata can
//! be three flat tables indexed by shifted address plus a constant bias:
//!
//! - remembered set: one byte per 128-byte card, nonzero when the card may
//!   hold pointers into new space
//! - object starts: one byte per card, the low byte of some object start
//!   inside the card, or [`NO_OBJECT_START`]
//! - mark bits: one bit per word
//!
//! The tables are sized once at setup and never resized. Cells are atomics
//! with relaxed ordering; chunks are page-exclusive to one space, so two
//! heaps never touch the same card or mark word.

use crate::config::MetadataConfig;
use core_types::{fatal, round_up, Address, FatalError, WORD_SHIFT, WORD_SIZE};
use once_cell::sync::OnceCell;
use page_allocator::{os, os::Region, PageAllocator, PAGE_SIZE};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// log2 of the card size.
pub const CARD_BITS: u32 = 7;
/// Bytes per remembered-set card.
pub const CARD_SIZE: usize = 1 << CARD_BITS;
/// Card holds no pointers into new space.
pub const NO_NEW_SPACE_POINTERS: u8 = 0;
/// Card may hold pointers into new space. Any nonzero value works.
pub const NEW_SPACE_POINTERS: u8 = 1;
/// Unaligned, so it never clashes with a real object start.
pub const NO_OBJECT_START: u8 = 2;
/// One mark bit per word: bytes of bitmap are `extent >> MARK_BITS_SHIFT`.
pub const MARK_BITS_SHIFT: u32 = 3 + WORD_SHIFT;

const ARENA_NAMES: [&str; 3] = ["arena0", "arena1", "arena2"];

static PROCESS_METADATA: OnceCell<Arc<GcMetadata>> = OnceCell::new();

/// Card table, object-start table and mark bitmap for one arena.
pub struct GcMetadata {
    pages: Mutex<PageAllocator>,
    lowest_address: Address,
    heap_extent: usize,
    number_of_cards: usize,
    heap_allocation_arena: u32,
    remembered_set: Box<[AtomicU8]>,
    object_starts: Box<[AtomicU8]>,
    mark_bits: Box<[AtomicU32]>,
    starts_bias: usize,
    remembered_set_bias: usize,
    mark_bits_bias: usize,
    // Dropped last: the page maps above refer into these.
    regions: Vec<Region>,
}

impl std::fmt::Debug for GcMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcMetadata")
            .field("lowest_address", &self.lowest_address)
            .field("heap_extent", &self.heap_extent)
            .field("number_of_cards", &self.number_of_cards)
            .field("heap_allocation_arena", &self.heap_allocation_arena)
            .finish()
    }
}

impl GcMetadata {
    /// Reserves the configured arenas and sizes the tables to the largest.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::MetadataSetup`] for an unusable configuration
    /// or when the OS refuses to reserve an arena.
    pub fn setup(config: &MetadataConfig) -> Result<Self, FatalError> {
        if config.page_size != PAGE_SIZE {
            return Err(FatalError::MetadataSetup(format!(
                "page size {} is not {}",
                config.page_size, PAGE_SIZE
            )));
        }
        if config.arena_sizes.is_empty() || config.arena_sizes.len() > ARENA_NAMES.len() {
            return Err(FatalError::MetadataSetup(format!(
                "{} arenas requested",
                config.arena_sizes.len()
            )));
        }

        let mut pages = PageAllocator::new();
        let mut regions = Vec::with_capacity(config.arena_sizes.len());
        let mut largest: Option<(u32, usize)> = None;
        for (i, &size) in config.arena_sizes.iter().enumerate() {
            let region = os::reserve(size).ok_or_else(|| {
                FatalError::MetadataSetup(format!("could not reserve {size} bytes"))
            })?;
            let map = vec![0u8; region.size() / PAGE_SIZE].into_boxed_slice();
            let bit = pages.add_arena(ARENA_NAMES[i], region.start(), region.size(), Some(map));
            if largest.map_or(true, |(_, best)| region.size() > best) {
                largest = Some((bit, region.size()));
            }
            regions.push(region);
        }
        let (heap_allocation_arena, _) =
            largest.ok_or_else(|| FatalError::MetadataSetup("no arena".to_string()))?;
        let (lowest_address, arena_pages) = pages
            .arena_bounds(heap_allocation_arena)
            .ok_or_else(|| FatalError::MetadataSetup("heap arena missing".to_string()))?;
        let heap_extent = arena_pages * PAGE_SIZE;

        let number_of_cards = heap_extent >> CARD_BITS;
        let remembered_set = atomic_bytes(number_of_cards, NO_NEW_SPACE_POINTERS);
        let object_starts = atomic_bytes(number_of_cards, NO_OBJECT_START);
        let mark_words = round_up(heap_extent >> MARK_BITS_SHIFT, 4) / 4 + 1;
        let mark_bits: Box<[AtomicU32]> = (0..mark_words).map(|_| AtomicU32::new(0)).collect();

        let shifted = lowest_address.raw() >> CARD_BITS;
        let starts_bias = (object_starts.as_ptr() as usize).wrapping_sub(shifted);
        let remembered_set_bias = (remembered_set.as_ptr() as usize).wrapping_sub(shifted);
        let mark_bits_bias = (mark_bits.as_ptr() as usize)
            .wrapping_sub(lowest_address.raw() >> MARK_BITS_SHIFT);

        info!(
            event = "metadata_setup",
            lowest = %lowest_address,
            extent = heap_extent,
            cards = number_of_cards,
            arenas = regions.len()
        );

        Ok(GcMetadata {
            pages: Mutex::new(pages),
            lowest_address,
            heap_extent,
            number_of_cards,
            heap_allocation_arena,
            remembered_set,
            object_starts,
            mark_bits,
            starts_bias,
            remembered_set_bias,
            mark_bits_bias,
            regions,
        })
    }

    /// The process-wide metadata, set up from the environment on first use.
    ///
    /// Setup failure here is fatal.
    pub fn process() -> Arc<GcMetadata> {
        PROCESS_METADATA
            .get_or_init(|| match GcMetadata::setup(&MetadataConfig::from_env()) {
                Ok(metadata) => Arc::new(metadata),
                Err(error) => fatal(error),
            })
            .clone()
    }

    /// Returns true if `address` lies in the heap arena.
    #[inline]
    pub fn in_metadata_range(&self, address: Address) -> bool {
        address.raw().wrapping_sub(self.lowest_address.raw()) < self.heap_extent
    }

    /// First byte of the heap arena.
    pub fn lowest_address(&self) -> Address {
        self.lowest_address
    }

    /// Size of the heap arena in bytes.
    pub fn heap_extent(&self) -> usize {
        self.heap_extent
    }

    /// Page allocator bit of the heap arena.
    pub fn heap_allocation_arena(&self) -> u32 {
        self.heap_allocation_arena
    }

    /// Bias added to `address >> CARD_BITS` to reach a remembered-set cell.
    pub fn remembered_set_bias(&self) -> usize {
        self.remembered_set_bias
    }

    /// Number of cards covered.
    pub fn number_of_cards(&self) -> usize {
        self.number_of_cards
    }

    /// Takes `pages` pages from the heap arena.
    pub fn allocate_pages(&self, pages: usize) -> Option<Address> {
        self.pages.lock().allocate_pages(pages, self.heap_allocation_arena)
    }

    /// Returns pages to the heap arena.
    pub fn free_pages(&self, start: Address, pages: usize) {
        self.pages.lock().free_pages(start, pages)
    }

    /// Object-start cell for the card holding `address`.
    #[inline]
    pub fn starts_for(&self, address: Address) -> &AtomicU8 {
        card_cell(&self.object_starts, self.starts_bias, address)
    }

    /// Remembered-set cell for the card holding `address`.
    #[inline]
    pub fn remembered_set_for(&self, address: Address) -> &AtomicU8 {
        card_cell(&self.remembered_set, self.remembered_set_bias, address)
    }

    /// Resets the object-start cells of `[start, end)`.
    pub fn initialize_starts_for_chunk(&self, start: Address, end: Address) {
        self.fill_cards(&self.object_starts, self.starts_bias, start, end, NO_OBJECT_START);
    }

    /// Resets the remembered-set cells of `[start, end)`.
    pub fn initialize_remembered_set_for_chunk(&self, start: Address, end: Address) {
        self.fill_cards(
            &self.remembered_set,
            self.remembered_set_bias,
            start,
            end,
            NO_NEW_SPACE_POINTERS,
        );
    }

    /// Clears the mark bits of `[start, end)`.
    pub fn clear_mark_bits_for(&self, start: Address, end: Address) {
        debug_assert!(self.in_metadata_range(start));
        let first = self.mark_word_index(start);
        let last = self.mark_word_index(end - WORD_SIZE);
        for cell in &self.mark_bits[first..=last] {
            cell.store(0, Ordering::Relaxed);
        }
    }

    /// Records `address` as an object start for its card.
    #[inline]
    pub fn record_start(&self, address: Address) {
        // Cards are smaller than 256 bytes, so the low byte is unambiguous.
        self.starts_for(address)
            .store(address.raw() as u8, Ordering::Relaxed);
    }

    /// Marks the card holding `address` as possibly pointing into new space.
    #[inline]
    pub fn insert_into_remembered_set(&self, address: Address) {
        self.remembered_set_for(address)
            .store(NEW_SPACE_POINTERS, Ordering::Relaxed);
    }

    /// Returns true if the card holding `address` is dirty.
    #[inline]
    pub fn is_marked_dirty(&self, address: Address) -> bool {
        self.remembered_set_for(address).load(Ordering::Relaxed) != NO_NEW_SPACE_POINTERS
    }

    /// Returns true if the object at `address` is marked.
    #[inline]
    pub fn is_marked(&self, address: Address) -> bool {
        let mask = 1u32 << ((address.raw() >> WORD_SHIFT) & 31);
        self.mark_word(address).load(Ordering::Relaxed) & mask != 0
    }

    /// Marks every word of the `size`-byte object at `address`.
    #[inline]
    pub fn mark(&self, address: Address, size: usize) {
        debug_assert!(size >= WORD_SIZE);
        let mask_shift = (address.raw() >> WORD_SHIFT) & 31;
        let size_in_words = size >> WORD_SHIFT;
        if mask_shift + size_in_words > 31 {
            return self.slow_mark(address, size);
        }
        let mask = ((1u32 << size_in_words) - 1) << mask_shift;
        self.mark_word(address).fetch_or(mask, Ordering::Relaxed);
    }

    /// Marking for objects whose bits cross a bitmap word.
    pub fn slow_mark(&self, address: Address, size: usize) {
        self.update_mark_bits(address, size, true);
    }

    /// Clears every mark bit of the `size`-byte object at `address`.
    pub fn clear_mark(&self, address: Address, size: usize) {
        self.update_mark_bits(address, size, false);
    }

    fn update_mark_bits(&self, address: Address, size: usize, set: bool) {
        let end = address + size;
        let mut current = address;
        while current < end {
            let shift = (current.raw() >> WORD_SHIFT) & 31;
            let words = ((end - current) >> WORD_SHIFT).min(32 - shift);
            let mask = if words == 32 {
                u32::MAX
            } else {
                ((1u32 << words) - 1) << shift
            };
            let cell = self.mark_word(current);
            if set {
                cell.fetch_or(mask, Ordering::Relaxed);
            } else {
                cell.fetch_and(!mask, Ordering::Relaxed);
            }
            current = current + (words << WORD_SHIFT);
        }
    }

    #[inline]
    fn mark_word_index(&self, address: Address) -> usize {
        let byte = ((address.raw() >> MARK_BITS_SHIFT).wrapping_add(self.mark_bits_bias)) & !3;
        byte.wrapping_sub(self.mark_bits.as_ptr() as usize) / 4
    }

    #[inline]
    fn mark_word(&self, address: Address) -> &AtomicU32 {
        debug_assert!(self.in_metadata_range(address));
        &self.mark_bits[self.mark_word_index(address)]
    }

    fn fill_cards(&self, table: &[AtomicU8], bias: usize, start: Address, end: Address, value: u8) {
        debug_assert!(self.in_metadata_range(start));
        let first = card_index(table, bias, start);
        let count = (end - start) >> CARD_BITS;
        for cell in &table[first..first + count] {
            cell.store(value, Ordering::Relaxed);
        }
    }
}

impl Drop for GcMetadata {
    fn drop(&mut self) {
        debug!(event = "metadata_teardown", arenas = self.regions.len());
    }
}

fn atomic_bytes(count: usize, value: u8) -> Box<[AtomicU8]> {
    (0..count).map(|_| AtomicU8::new(value)).collect()
}

#[inline]
fn card_index(table: &[AtomicU8], bias: usize, address: Address) -> usize {
    (address.raw() >> CARD_BITS)
        .wrapping_add(bias)
        .wrapping_sub(table.as_ptr() as usize)
}

#[inline]
fn card_cell(table: &[AtomicU8], bias: usize, address: Address) -> &AtomicU8 {
    &table[card_index(table, bias, address)]
}
