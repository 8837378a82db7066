//! Undo record types and serialization.

use super::layout::{
    self, record_hasher, Trailer, MAX_WRITE_HEADER_LEN, MIN_HEADER_LEN, TRAILER_LEN,
};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, SubsecRound, Utc};
use undojournal_codec::{CodecError, FieldDecoder, FieldEncoder};

/// Type tag of an undo record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Pre-image of an in-place write.
    Write = 0,
    /// Length change of the target, with the truncated tail if it shrank.
    Length = 1,
}

impl RecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Write),
            1 => Some(Self::Length),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Largest header a record of this type can have.
    #[must_use]
    pub const fn max_header_len(self) -> usize {
        match self {
            Self::Write => MAX_WRITE_HEADER_LEN,
            Self::Length => layout::MAX_HEADER_LEN,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Write => "WRITE",
            Self::Length => "LENGTH",
        }
    }
}

/// Variant-specific fields of an undo record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `data_length` bytes of the target at `target_offset` were about to be
    /// overwritten. A zero `data_length` marks a pure append past the old
    /// end of the target, which has no pre-image.
    Write {
        /// Target offset of the saved range.
        target_offset: u64,
        /// Number of pre-image bytes saved.
        data_length: u32,
    },

    /// The target length changed from `old_length` to `new_length`.
    Length {
        /// Length before the change.
        old_length: u64,
        /// Length after the change.
        new_length: u64,
    },
}

impl RecordKind {
    /// Returns the record type.
    #[must_use]
    pub const fn record_type(&self) -> RecordType {
        match self {
            Self::Write { .. } => RecordType::Write,
            Self::Length { .. } => RecordType::Length,
        }
    }

    /// Number of payload bytes following the header.
    ///
    /// For `Length` records this is the truncated tail, or zero on growth.
    #[must_use]
    pub const fn data_length(&self) -> u64 {
        match *self {
            Self::Write { data_length, .. } => data_length as u64,
            Self::Length {
                old_length,
                new_length,
            } => old_length.saturating_sub(new_length),
        }
    }

    /// Encoded header length, from the tag through the last field.
    #[must_use]
    pub const fn header_len(&self) -> usize {
        match *self {
            Self::Write {
                target_offset,
                data_length,
            } => layout::header_len(target_offset, data_length as u64),
            Self::Length {
                old_length,
                new_length,
            } => layout::header_len(old_length, new_length),
        }
    }
}

/// A decoded undo record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    /// Offset of the record's tag byte in the journal.
    pub journal_offset: u64,
    /// When the record was written, at microsecond precision.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific fields.
    pub kind: RecordKind,
}

impl Record {
    /// Returns the record type.
    #[must_use]
    pub const fn record_type(&self) -> RecordType {
        self.kind.record_type()
    }

    /// Number of payload bytes.
    #[must_use]
    pub const fn data_length(&self) -> u64 {
        self.kind.data_length()
    }

    /// Encoded header length.
    #[must_use]
    pub const fn header_len(&self) -> usize {
        self.kind.header_len()
    }

    /// Total on-disk size: header, payload and trailer.
    #[must_use]
    pub const fn encoded_len(&self) -> u64 {
        self.header_len() as u64 + self.data_length() + TRAILER_LEN as u64
    }

    /// Journal offset of the first payload byte.
    #[must_use]
    pub const fn payload_offset(&self) -> u64 {
        self.journal_offset + self.header_len() as u64
    }

    /// Journal offset just past this record, where the next one starts.
    #[must_use]
    pub const fn end_offset(&self) -> u64 {
        self.journal_offset + self.encoded_len()
    }
}

/// Serializes a complete record: header, payload and trailer.
///
/// The record is only valid at `journal_offset`, which its checksum covers.
/// `timestamp` is truncated to the microseconds the journal stores.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] if `payload` does not hold exactly
/// the number of bytes the record declares.
pub fn encode_record(
    journal_offset: u64,
    kind: &RecordKind,
    timestamp: DateTime<Utc>,
    payload: &[u8],
) -> CoreResult<Vec<u8>> {
    if payload.len() as u64 != kind.data_length() {
        return Err(CoreError::invalid_argument(format!(
            "{} record declares {} payload bytes, got {}",
            kind.record_type().name(),
            kind.data_length(),
            payload.len()
        )));
    }

    let header_len = kind.header_len();
    let mut encoder = FieldEncoder::with_capacity(header_len + payload.len() + TRAILER_LEN);
    encoder.write_u8(kind.record_type().as_byte());
    encoder.write_timestamp(timestamp.trunc_subsecs(6));
    match *kind {
        RecordKind::Write {
            target_offset,
            data_length,
        } => {
            encoder.write_positive_u64(target_offset);
            encoder.write_positive_u32(data_length);
        }
        RecordKind::Length {
            old_length,
            new_length,
        } => {
            encoder.write_positive_u64(old_length);
            encoder.write_positive_u64(new_length);
        }
    }
    debug_assert_eq!(encoder.len(), header_len);
    encoder.write_bytes(payload);

    let mut hasher = record_hasher(journal_offset);
    hasher.update(encoder.as_bytes());
    Trailer {
        checksum: hasher.finalize(),
        header_len: header_len as u8,
        data_length: kind.data_length(),
        tag: kind.record_type().as_byte(),
    }
    .encode(&mut encoder);

    Ok(encoder.into_bytes())
}

/// Why a header could not be decoded.
#[derive(Debug)]
pub(crate) enum HeaderError {
    /// The tag byte is not a known record type.
    UnknownTag(u8),
    /// A field failed to decode `at` bytes into the header.
    Codec { at: usize, error: CodecError },
}

/// Decodes a record header from the start of `bytes`.
///
/// Returns the record and the number of header bytes consumed. Bytes past
/// the header are ignored.
pub(crate) fn decode_header(
    bytes: &[u8],
    journal_offset: u64,
) -> Result<(Record, usize), HeaderError> {
    let mut decoder = FieldDecoder::new(bytes);
    let codec = |decoder: &FieldDecoder<'_>, error: CodecError| HeaderError::Codec {
        at: decoder.position(),
        error,
    };

    let tag = decoder
        .read_record_type(false)
        .map_err(|e| codec(&decoder, e))?
        .unwrap_or_default();
    let record_type = RecordType::from_byte(tag).ok_or(HeaderError::UnknownTag(tag))?;
    let timestamp = decoder.read_timestamp().map_err(|e| codec(&decoder, e))?;

    let kind = match record_type {
        RecordType::Write => {
            let target_offset = decoder
                .read_positive_u64()
                .map_err(|e| codec(&decoder, e))?;
            let data_length = decoder
                .read_positive_u32()
                .map_err(|e| codec(&decoder, e))?;
            RecordKind::Write {
                target_offset,
                data_length,
            }
        }
        RecordType::Length => {
            let old_length = decoder
                .read_positive_u64()
                .map_err(|e| codec(&decoder, e))?;
            let new_length = decoder
                .read_positive_u64()
                .map_err(|e| codec(&decoder, e))?;
            RecordKind::Length {
                old_length,
                new_length,
            }
        }
    };

    debug_assert!(decoder.position() >= MIN_HEADER_LEN);
    Ok((
        Record {
            journal_offset,
            timestamp,
            kind,
        },
        decoder.position(),
    ))
}
