//! Failure kinds and fatal runtime errors.
//!
//! Recoverable conditions travel in-band as failure words (see
//! [`crate::Failure`]). Structural exhaustion and misuse of the page source
//! are [`FatalError`]s: they end the process with a logged reason.

use thiserror::Error;
use tracing::error;

/// The kinds of in-band failure sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum FailureKind {
    /// Allocation needs a garbage collection before it can succeed.
    RetryAfterGc = 0,
    /// An argument had the wrong type.
    WrongArgumentType = 1,
    /// An index was outside the valid range.
    IndexOutOfBounds = 2,
    /// The operation is not valid in the current state.
    IllegalState = 3,
    /// The running process should yield.
    ShouldPreempt = 4,
}

impl FailureKind {
    /// Decodes the code stored above a failure tag.
    pub fn from_code(code: usize) -> Option<Self> {
        match code {
            0 => Some(FailureKind::RetryAfterGc),
            1 => Some(FailureKind::WrongArgumentType),
            2 => Some(FailureKind::IndexOutOfBounds),
            3 => Some(FailureKind::IllegalState),
            4 => Some(FailureKind::ShouldPreempt),
            _ => None,
        }
    }
}

/// Unrecoverable conditions. Reaching one terminates the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// All arena slots of the page allocator are in use.
    #[error("Too many arenas added")]
    TooManyArenas,

    /// Pages were returned that no arena owns.
    #[error("Free of unallocated pages")]
    FreeOfUnallocatedPages,

    /// The page source could not provide a chunk.
    #[error("Failed to allocate {size} bytes.")]
    ChunkAllocationFailed {
        /// Requested chunk size in bytes.
        size: usize,
    },

    /// The destination space ran out while copying live objects.
    #[error("Scavenge could not copy an object of {size} bytes")]
    ScavengeExhausted {
        /// Size of the object being copied.
        size: usize,
    },

    /// An allocation still failed after a collection.
    #[error("Out of memory: allocation of {size} bytes failed after garbage collection")]
    AllocationRetryExhausted {
        /// Size of the failed allocation.
        size: usize,
    },

    /// The metadata tables could not be set up.
    #[error("GC metadata setup failed: {0}")]
    MetadataSetup(String),
}

/// Logs `error` and terminates.
///
/// Release builds are compiled with `panic = "abort"`, so this ends the
/// process; test builds unwind so the condition can be asserted on.
#[cold]
#[track_caller]
pub fn fatal(error: FatalError) -> ! {
    error!(event = "fatal", reason = %error, "Unrecoverable memory error");
    panic!("{}", error)
}
