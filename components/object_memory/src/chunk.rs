//! Page-aligned memory blocks owned by a space.

#![allow(unsafe_code)]

use crate::gc_metadata::GcMetadata;
use core_types::{round_up, Address};
use page_allocator::{pages_for_bytes, PAGE_SIZE};
use std::sync::atomic::{AtomicUsize, Ordering};

static ALLOCATED: AtomicUsize = AtomicUsize::new(0);

/// Bytes currently held in chunks across all spaces.
pub fn allocated_memory() -> usize {
    ALLOCATED.load(Ordering::Relaxed)
}

/// A run of whole pages from the metadata's heap arena.
#[derive(Debug, PartialEq, Eq)]
pub struct Chunk {
    start: Address,
    end: Address,
    scavenge_pointer: Address,
}

impl Chunk {
    /// Takes at least `size` bytes of pages from `metadata`.
    pub(crate) fn allocate(metadata: &GcMetadata, size: usize) -> Option<Chunk> {
        let size = round_up(size, PAGE_SIZE);
        let start = metadata.allocate_pages(pages_for_bytes(size))?;
        let chunk = Chunk {
            start,
            end: start + size,
            scavenge_pointer: start,
        };
        if cfg!(debug_assertions) {
            chunk.scramble();
        }
        ALLOCATED.fetch_add(size, Ordering::Relaxed);
        Some(chunk)
    }

    /// Returns the pages. Nothing may point into the chunk any more.
    pub(crate) fn release(self, metadata: &GcMetadata) {
        if cfg!(debug_assertions) {
            self.scramble();
        }
        ALLOCATED.fetch_sub(self.size(), Ordering::Relaxed);
        metadata.free_pages(self.start, pages_for_bytes(self.size()));
    }

    fn scramble(&self) {
        // SAFETY: the chunk's pages belong to it alone until released.
        unsafe { self.start.fill(0xab, self.size()) }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn size(&self) -> usize {
        self.end - self.start
    }

    pub fn includes(&self, address: Address) -> bool {
        self.start <= address && address < self.end
    }

    /// Where the next scan of this chunk resumes.
    pub fn scavenge_pointer(&self) -> Address {
        self.scavenge_pointer
    }

    pub fn set_scavenge_pointer(&mut self, pointer: Address) {
        debug_assert!(self.start <= pointer && pointer <= self.end);
        self.scavenge_pointer = pointer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataConfig;

    #[test]
    fn test_chunk_rounds_to_pages() {
        let metadata =
            GcMetadata::setup(&MetadataConfig::default().with_arena_size(1 << 20)).unwrap();
        let chunk = Chunk::allocate(&metadata, 100).unwrap();
        assert_eq!(chunk.size(), PAGE_SIZE);
        assert!(chunk.start().is_aligned_to(PAGE_SIZE));
        assert!(chunk.includes(chunk.start()));
        assert!(!chunk.includes(chunk.end()));
        assert_eq!(chunk.scavenge_pointer(), chunk.start());
        assert!(allocated_memory() >= PAGE_SIZE);
        let start = chunk.start();
        chunk.release(&metadata);
        let again = Chunk::allocate(&metadata, PAGE_SIZE).unwrap();
        assert_eq!(again.start(), start);
        again.release(&metadata);
    }

    #[test]
    fn test_exhausted_arena() {
        let metadata =
            GcMetadata::setup(&MetadataConfig::default().with_arena_size(4 * PAGE_SIZE)).unwrap();
        assert!(Chunk::allocate(&metadata, 8 * PAGE_SIZE).is_none());
    }
}
