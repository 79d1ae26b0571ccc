//! Unit tests for tagged object words

use core_types::{Address, Failure, FailureKind, Object, Smi, Tag};

#[cfg(test)]
mod tagging_tests {
    use super::*;

    #[test]
    fn test_smi_tag_is_zero() {
        assert_eq!(Object::from_smi(5).raw() & 1, 0);
        assert_eq!(Object::from_smi(5).raw(), 10);
    }

    #[test]
    fn test_heap_tag_is_one() {
        let object = Object::from_address(Address::new(0x2000));
        assert_eq!(object.raw(), 0x2001);
        assert_eq!(object.tag(), Tag::HeapObject);
    }

    #[test]
    fn test_failure_tag_is_three() {
        let failure = Failure::word(FailureKind::ShouldPreempt);
        assert_eq!(failure.raw() & 3, 3);
        assert_eq!(failure.tag(), Tag::Failure);
        assert_eq!(failure.failure_kind(), Some(FailureKind::ShouldPreempt));
    }

    #[test]
    fn test_smi_round_trip_over_range() {
        let mut value = 1isize;
        while value < Smi::MAX_VALUE / 3 {
            assert_eq!(Object::from_smi(value).smi_value(), value);
            assert_eq!(Object::from_smi(-value).smi_value(), -value);
            value *= 3;
        }
    }

    #[test]
    fn test_address_round_trip() {
        for raw in [0x1000usize, 0x7fff_f000, 0x10_0008] {
            let address = Address::new(raw);
            assert_eq!(Object::from_address(address).heap_address(), address);
        }
    }

    #[test]
    fn test_zero_is_smi_zero() {
        assert_eq!(Object::ZERO, Object::from_smi(0));
        assert_eq!(Object::default(), Object::ZERO);
    }
}
