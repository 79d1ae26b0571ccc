//! Unit tests for FailureKind and FatalError

use core_types::{FailureKind, FatalError};

#[cfg(test)]
mod failure_kind_tests {
    use super::*;

    #[test]
    fn test_failure_kind_codes_are_stable() {
        assert_eq!(FailureKind::RetryAfterGc as usize, 0);
        assert_eq!(FailureKind::WrongArgumentType as usize, 1);
        assert_eq!(FailureKind::IndexOutOfBounds as usize, 2);
        assert_eq!(FailureKind::IllegalState as usize, 3);
        assert_eq!(FailureKind::ShouldPreempt as usize, 4);
    }

    #[test]
    fn test_unknown_code() {
        assert!(FailureKind::from_code(99).is_none());
    }
}

#[cfg(test)]
mod fatal_error_tests {
    use super::*;

    #[test]
    fn test_error_is_std_error() {
        let error: Box<dyn std::error::Error> = Box::new(FatalError::ScavengeExhausted { size: 64 });
        assert!(error.to_string().contains("64"));
    }

    #[test]
    fn test_retry_exhausted_message() {
        let error = FatalError::AllocationRetryExhausted { size: 128 };
        assert!(error.to_string().starts_with("Out of memory"));
    }
}
