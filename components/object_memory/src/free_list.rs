//! Segregated free list of the mark-sweep space.

use crate::kinds::{FreeListChunk, OneWordFiller};
use core_types::{highest_bit, Address, WORD_SIZE};

/// Number of power-of-two size buckets.
pub const FREE_LIST_BUCKETS: usize = 12;

/// Free chunks bucketed by the position of the highest bit of their size.
///
/// Bucket `i` holds chunks of size `[2^(i+1), 2^(i+2))`; the last bucket
/// takes everything larger. Chunks are pushed and taken at the head.
#[derive(Debug, Default)]
pub struct FreeList {
    buckets: [Option<FreeListChunk>; FREE_LIST_BUCKETS],
}

fn bucket_for(size: usize) -> usize {
    (highest_bit(size) as usize - 1).min(FREE_LIST_BUCKETS - 1)
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `[start, start + size)` on the list.
    ///
    /// Regions too small for a chunk header are filled with one-word fillers
    /// so the heap stays parseable.
    pub fn add_chunk(&mut self, start: Address, size: usize) {
        if size < FreeListChunk::SIZE {
            for i in 0..size / WORD_SIZE {
                OneWordFiller::create(start.word(i));
            }
            return;
        }
        let chunk = FreeListChunk::create(start, size);
        let bucket = bucket_for(size);
        chunk.set_next(self.buckets[bucket]);
        self.buckets[bucket] = Some(chunk);
    }

    /// Takes a chunk of at least `min_size` bytes.
    ///
    /// Every chunk in a bucket above the one `min_size` falls into is big
    /// enough, so the largest non-empty one is used first. Failing that, the
    /// bucket of `min_size` itself is searched.
    pub fn get_chunk(&mut self, min_size: usize) -> Option<FreeListChunk> {
        let smallest_bucket = highest_bit(min_size) as usize;
        for bucket in (smallest_bucket..FREE_LIST_BUCKETS).rev() {
            if let Some(chunk) = self.buckets[bucket] {
                self.buckets[bucket] = chunk.next();
                return Some(chunk);
            }
        }

        let bucket = smallest_bucket.min(FREE_LIST_BUCKETS) - 1;
        let mut previous: Option<FreeListChunk> = None;
        let mut current = self.buckets[bucket];
        while let Some(chunk) = current {
            if chunk.size() >= min_size {
                match previous {
                    Some(previous) => previous.set_next(chunk.next()),
                    None => self.buckets[bucket] = chunk.next(),
                }
                return Some(chunk);
            }
            previous = Some(chunk);
            current = chunk.next();
        }
        None
    }

    /// Drops every chunk.
    pub fn clear(&mut self) {
        self.buckets = [None; FREE_LIST_BUCKETS];
    }

    /// Moves every chunk of `other` into this list.
    pub fn merge(&mut self, other: &mut FreeList) {
        for (mine, theirs) in self.buckets.iter_mut().zip(other.buckets.iter_mut()) {
            let Some(head) = theirs.take() else {
                continue;
            };
            let mut tail = head;
            while let Some(next) = tail.next() {
                tail = next;
            }
            tail.set_next(*mine);
            *mine = Some(head);
        }
    }

    fn chunks(&self) -> impl Iterator<Item = FreeListChunk> + '_ {
        self.buckets
            .iter()
            .flat_map(|head| std::iter::successors(*head, |chunk| chunk.next()))
    }

    /// Bytes held by all chunks.
    pub fn total_free(&self) -> usize {
        self.chunks().map(FreeListChunk::size).sum()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Option::is_none)
    }
}
