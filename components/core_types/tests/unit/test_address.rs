//! Unit tests for Address and word arithmetic

use core_types::{highest_bit, round_up, Address, WORD_SIZE};

#[cfg(test)]
mod address_tests {
    use super::*;

    #[test]
    fn test_word_size_matches_pointer() {
        assert_eq!(WORD_SIZE, std::mem::size_of::<*const u8>());
    }

    #[test]
    fn test_word_offsets() {
        let base = Address::new(0x8000);
        assert_eq!(base.word(0), base);
        assert_eq!(base.word(3).distance_from(base), 3 * WORD_SIZE);
    }

    #[test]
    fn test_alignment() {
        assert!(Address::new(0x8000).is_aligned_to(4096));
        assert!(!Address::new(0x8008).is_aligned_to(4096));
        assert_eq!(round_up(13, WORD_SIZE), 16);
    }

    #[test]
    fn test_highest_bit_buckets() {
        // Free-list bucket selection relies on these values.
        assert_eq!(highest_bit(24), 5);
        assert_eq!(highest_bit(32), 6);
        assert_eq!(highest_bit(4095), 12);
    }

    #[test]
    fn test_copy_and_fill() {
        let mut source = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut dest = [0u8; 8];
        let from = Address::from_ptr(source.as_mut_ptr());
        let to = Address::from_ptr(dest.as_mut_ptr());
        // SAFETY: both arrays are live and disjoint.
        unsafe {
            to.copy_from(from, 8);
        }
        assert_eq!(dest, source);
        // SAFETY: `dest` is live.
        unsafe {
            to.fill(0xab, 4);
        }
        assert_eq!(&dest[..4], &[0xab; 4]);
    }
}
