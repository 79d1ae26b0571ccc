//! Core word-level types shared by the runtime's memory components.
//!
//! This crate provides the tagging scheme every other component agrees on:
//!
//! # Overview
//!
//! - [`Address`] - Untagged raw address; the only place raw memory is touched
//! - [`Object`] - Tagged machine word (Smi, heap reference or failure)
//! - [`Tag`] - Decoded tag of an [`Object`]
//! - [`FailureKind`] - In-band error kinds carried by failure words
//! - [`FatalError`] - Unrecoverable conditions that end the process
//! - [`fatal`] - Logs a [`FatalError`] and terminates
//!
//! # Examples
//!
//! ```
//! use core_types::{Address, Failure, FailureKind, Object, Tag};
//!
//! let smi = Object::from_smi(-3);
//! assert_eq!(smi.tag(), Tag::Smi);
//!
//! let object = Object::from_address(Address::new(0x4000));
//! assert_eq!(object.heap_address(), Address::new(0x4000));
//!
//! assert_eq!(Failure::retry_after_gc().failure_kind(), Some(FailureKind::RetryAfterGc));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod address;
mod error;
mod value;

pub use address::{
    highest_bit, is_aligned, round_down, round_up, Address, WORD_SHIFT, WORD_SIZE,
};
pub use error::{fatal, FailureKind, FatalError};
pub use value::{Failure, HeapTag, Object, Smi, Tag};
