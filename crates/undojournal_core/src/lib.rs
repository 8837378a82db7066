//! # UndoJournal Core
//!
//! Record-level reader for an ACID undo journal.
//!
//! Before an in-place write or truncation is applied to a protected target
//! stream, the bytes it would destroy are appended to the journal as an undo
//! record. This crate provides:
//! - The record model ([`Record`], [`RecordKind`])
//! - Forward and backward scanners that decode records straight from the
//!   journal bytes, for both blocking and async backends
//! - [`JournalReader`] / [`AsyncJournalReader`] adapters that keep a position
//! - [`JournalWriter`], which appends undo records
//!
//! Replaying pre-images onto the target and deciding when to commit or roll
//! back are left to the caller.
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use undojournal_core::{JournalReader, JournalWriter, WriterConfig};
//! use undojournal_storage::InMemoryBackend;
//!
//! let mut writer = JournalWriter::create(InMemoryBackend::new(), WriterConfig::default()).unwrap();
//! writer.record_write(100, &[0xAA; 50], Utc::now()).unwrap();
//! writer.record_length(2_000, 500, &[0u8; 1_500], Utc::now()).unwrap();
//!
//! let mut reader = JournalReader::new(writer.into_inner());
//! reader.seek_end().unwrap();
//! let newest = reader.next_backward().unwrap().unwrap();
//! assert_eq!(newest.data_length(), 1_500);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod journal;

pub use config::{ScanConfig, WriterConfig};
pub use error::{CoreError, CoreResult};
pub use journal::{
    encode_record, scan_backward, scan_backward_async, scan_forward, scan_forward_async,
    AsyncJournalReader, Backward, JournalReader, JournalWriter, Record, RecordKind, RecordType,
    ScanBuffer, Scanned, Scanner, JOURNAL_MAGIC, JOURNAL_START, MAX_HEADER_LEN, SCRATCH_LEN,
    TRAILER_LEN,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
