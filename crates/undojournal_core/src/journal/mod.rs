//! Undo journal records and the bidirectional scanner.
//!
//! ## Journal Layout
//!
//! ```text
//! | reserved header (8) | record | record | ... |
//! ```
//!
//! The header is never scanned; offset [`JOURNAL_START`] is the first record
//! boundary. Records follow each other with no gaps.
//!
//! ## Record Format
//!
//! ```text
//! | tag (1) | timestamp (8) | fields | payload (data_length) | trailer (14) |
//! trailer = | checksum (u32 LE) | header_len (1) | data_length (u64 LE) | tag (1) |
//! ```
//!
//! - `Write` (tag 0): `target_offset` (positive u64), `data_length`
//!   (positive u32). The payload is the pre-image of the overwritten range.
//! - `Length` (tag 1): `old_length`, `new_length` (positive u64). The
//!   payload holds the `old_length - new_length` tail bytes lost to a
//!   truncation, and is empty when the target grew.
//!
//! Positive integers are variable width (zero is one byte), so the header
//! length is only known after decoding it. The fixed-width trailer repeats
//! the tag, header length and payload length so that a scan positioned at
//! the end of a record can find its start without an index.
//!
//! The checksum is a CRC32 over the record's journal offset (u64 LE), its
//! header and its payload. Both scan directions verify it, so a torn tail
//! whose last bytes happen to look like a record is rejected rather than
//! returned.
//!
//! ## Scanning
//!
//! Scans are sans-IO state machines ([`ForwardScan`], [`BackwardScan`]) that
//! ask for byte ranges and decode what they are handed. [`Scanner`] drives
//! them against a [`undojournal_storage::StorageBackend`] or, with every
//! read as a suspension point, an
//! [`undojournal_storage::AsyncStorageBackend`].
//!
//! ## Invariants
//!
//! - Forward scans advance a cursor from one record boundary to the next;
//!   backward scans rewind it by exactly one record
//! - A record decoded backward is identical to the one decoded forward at
//!   the same offset
//! - Hitting the end (forward) or [`JOURNAL_START`] (backward) is a clean
//!   `None`, never an error
//! - A failed scan never yields a partially decoded record
//!
//! ## Caller Discipline
//!
//! Nothing here is internally synchronized. At most one scan may be in
//! flight per journal, forward scans must be issued in increasing offset
//! order and backward scans in decreasing order. After an error or a
//! cancelled async scan the caller must reposition explicitly.

mod driver;
mod layout;
mod reader;
mod record;
mod scan;
mod writer;

pub use driver::{
    scan_backward, scan_backward_async, scan_forward, scan_forward_async, Scanner,
};
pub use layout::{
    Trailer, JOURNAL_MAGIC, JOURNAL_START, MAX_HEADER_LEN, MIN_HEADER_LEN, TRAILER_LEN,
};
pub use reader::{AsyncJournalReader, Backward, JournalReader};
pub use record::{encode_record, Record, RecordKind, RecordType};
pub use scan::{
    BackwardScan, ForwardScan, ScanBuffer, ScanMachine, ScanStep, Scanned, SCRATCH_LEN,
};
pub use writer::JournalWriter;
