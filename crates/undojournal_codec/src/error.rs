//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding record fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended before the field was complete.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Bytes the field required.
        needed: usize,
        /// Bytes left in the input.
        available: usize,
    },

    /// A positive-integer width byte was out of range.
    #[error("invalid integer width {width} (maximum {max})")]
    InvalidWidth {
        /// The width byte that was read.
        width: u8,
        /// The largest width allowed for the field.
        max: u8,
    },

    /// A positive integer was not encoded in its shortest form.
    #[error("non-canonical integer encoding of width {width}")]
    NonCanonical {
        /// The width byte that was read.
        width: u8,
    },

    /// A timestamp cannot be represented.
    #[error("timestamp out of range: {micros} microseconds")]
    TimestampOutOfRange {
        /// The raw microsecond value.
        micros: i64,
    },
}

impl CodecError {
    /// Returns `true` if decoding failed only because the input was short.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}
