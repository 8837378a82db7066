//! # UndoJournal Codec
//!
//! Field-level codecs for undo journal records.
//!
//! Records are built from three kinds of fields:
//! - a one-byte record-type tag
//! - a fixed 8-byte timestamp (signed microseconds since the Unix epoch,
//!   little-endian)
//! - positive integers in a compact, canonical form
//!
//! ## Positive Integers
//!
//! ```text
//! 0        -> | 0x00 |
//! n != 0   -> | w | w bytes little-endian |    w = minimal width, 1..=8
//! ```
//!
//! Zero always takes one byte while any non-zero value takes `1 + w` bytes.
//! Callers computing record sizes must use [`positive_len`] rather than
//! assuming a fixed width.
//!
//! ## Usage
//!
//! ```
//! use undojournal_codec::{FieldDecoder, FieldEncoder};
//!
//! let mut encoder = FieldEncoder::new();
//! encoder.write_positive_u64(1_500);
//! encoder.write_positive_u64(0);
//! let bytes = encoder.into_bytes();
//! assert_eq!(bytes.len(), 3 + 1);
//!
//! let mut decoder = FieldDecoder::new(&bytes);
//! assert_eq!(decoder.read_positive_u64().unwrap(), 1_500);
//! assert_eq!(decoder.read_positive_u64().unwrap(), 0);
//! assert!(decoder.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;

pub use decoder::FieldDecoder;
pub use encoder::{positive_len, FieldEncoder};
pub use error::{CodecError, CodecResult};

/// Encoded size of a timestamp field.
pub const TIMESTAMP_LEN: usize = 8;

/// Encoded size of the record-type tag.
pub const TAG_LEN: usize = 1;

/// Largest encoded size of a 64-bit positive integer.
pub const MAX_POSITIVE_U64_LEN: usize = 9;

/// Largest encoded size of a 32-bit positive integer.
pub const MAX_POSITIVE_U32_LEN: usize = 5;
