//! # UndoJournal Testkit
//!
//! Test utilities for UndoJournal.
//!
//! This crate provides:
//! - Journal fixtures: an in-memory [`JournalBuilder`] and a file-backed
//!   [`TempJournal`]
//! - Property-based generators that simulate a target stream and record
//!   every mutation as an undo record
//! - Helpers to apply pre-images, used to check that a backward scan carries
//!   enough to restore the target
//!
//! ## Usage
//!
//! ```rust
//! use undojournal_testkit::prelude::*;
//!
//! let mut builder = JournalBuilder::new();
//! builder.write(0, &[1, 2, 3]);
//! builder.length(3, 1, &[2, 3]);
//! let journal = builder.finish();
//!
//! assert_eq!(journal.records.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
