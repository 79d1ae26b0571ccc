//! Allocation errors.
//!
//! Allocation never throws. A failed allocation is an [`AllocError`], which
//! converts to the in-band failure word the interpreter passes around.

use core_types::{Address, Failure, FailureKind, Object};
use thiserror::Error;

/// A recoverable allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The space needs a collection before `size` bytes can be allocated.
    #[error("allocation of {size} bytes needs a garbage collection")]
    RetryAfterGc {
        /// Requested size in bytes.
        size: usize,
    },

    /// Any other in-band failure.
    #[error("allocation failed: {0:?}")]
    Failure(FailureKind),
}

impl AllocError {
    /// The failure kind carried in the failure word.
    pub fn kind(&self) -> FailureKind {
        match self {
            AllocError::RetryAfterGc { .. } => FailureKind::RetryAfterGc,
            AllocError::Failure(kind) => *kind,
        }
    }

    /// Returns true if a collection may let the allocation succeed.
    pub fn is_retry_after_gc(&self) -> bool {
        matches!(self, AllocError::RetryAfterGc { .. })
    }

    /// Size of the failed request, when known.
    pub fn size(&self) -> Option<usize> {
        match self {
            AllocError::RetryAfterGc { size } => Some(*size),
            AllocError::Failure(_) => None,
        }
    }
}

/// An inconsistency found by [`OldSpace::verify`](crate::OldSpace::verify).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The object-start table names something that is not an object start.
    #[error("object start entry of card {card} does not name an object in that card")]
    BadObjectStart {
        /// Start of the card.
        card: Address,
    },

    /// An object points into new space but its card is clean.
    #[error("object at {object} points into new space but its card is clean")]
    MissingRememberedSetEntry {
        /// Address of the object.
        object: Address,
    },
}

impl From<AllocError> for Object {
    fn from(error: AllocError) -> Object {
        Failure::word(error.kind())
    }
}
