//! Journal layout constants and record-size arithmetic.

use crc32fast::Hasher;
use undojournal_codec::{
    positive_len, CodecResult, FieldDecoder, FieldEncoder, MAX_POSITIVE_U32_LEN,
    MAX_POSITIVE_U64_LEN, TAG_LEN, TIMESTAMP_LEN,
};

/// Offset of the first record; bytes before it are the reserved header.
pub const JOURNAL_START: u64 = 8;

/// Header bytes written by [`crate::JournalWriter`] to a fresh journal.
pub const JOURNAL_MAGIC: [u8; 8] = *b"UNDOJRN1";

/// Size of the fixed trailer closing every record.
/// checksum (4) + header_len (1) + data_length (8) + tag (1)
pub const TRAILER_LEN: usize = 14;

/// Smallest possible record header: tag, timestamp and two zero fields.
pub const MIN_HEADER_LEN: usize = TAG_LEN + TIMESTAMP_LEN + 2;

/// Largest `Write` header: tag, timestamp, u64 offset, u32 length.
pub(crate) const MAX_WRITE_HEADER_LEN: usize =
    TAG_LEN + TIMESTAMP_LEN + MAX_POSITIVE_U64_LEN + MAX_POSITIVE_U32_LEN;

/// Largest record header of any type (a `Length` header).
pub const MAX_HEADER_LEN: usize = TAG_LEN + TIMESTAMP_LEN + 2 * MAX_POSITIVE_U64_LEN;

/// Header length for the given variable-width fields.
pub(crate) const fn header_len(first: u64, second: u64) -> usize {
    TAG_LEN + TIMESTAMP_LEN + positive_len(first) + positive_len(second)
}

/// Total on-disk size of a record, or `None` on overflow.
pub(crate) fn record_len(header_len: usize, data_length: u64) -> Option<u64> {
    (header_len as u64)
        .checked_add(data_length)?
        .checked_add(TRAILER_LEN as u64)
}

/// Starts the checksum of the record at `journal_offset`.
///
/// The CRC32 covers the record's journal offset (u64 LE), its header and its
/// payload, so bytes that look like a record but sit anywhere other than
/// where they were written fail verification.
pub(crate) fn record_hasher(journal_offset: u64) -> Hasher {
    let mut hasher = Hasher::new();
    hasher.update(&journal_offset.to_le_bytes());
    hasher
}

/// The fixed-width suffix of a record.
///
/// A backward scan reads it first: the tag is the record's last byte,
/// `data_length` precedes it, then `header_len`, then the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// CRC32 of the journal offset, header and payload.
    pub checksum: u32,
    /// Length of the record header, from the tag through the last field.
    pub header_len: u8,
    /// Payload length.
    pub data_length: u64,
    /// Raw record-type tag.
    pub tag: u8,
}

impl Trailer {
    pub(crate) fn encode(&self, encoder: &mut FieldEncoder) {
        encoder.write_u32_le(self.checksum);
        encoder.write_u8(self.header_len);
        encoder.write_u64_le(self.data_length);
        encoder.write_u8(self.tag);
    }

    /// Decodes a trailer from exactly [`TRAILER_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `bytes` is too short.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut decoder = FieldDecoder::new(bytes);
        let checksum = decoder.read_u32_le()?;
        let header_len = decoder.read_u8()?;
        let data_length = decoder.read_u64_le()?;
        let tag = decoder.read_u8()?;
        Ok(Self {
            checksum,
            header_len,
            data_length,
            tag,
        })
    }

    /// Offset of the record's first byte, given the offset just past its
    /// trailer. `None` if the record would start before [`JOURNAL_START`].
    #[must_use]
    pub fn record_start(&self, end: u64) -> Option<u64> {
        end.checked_sub(TRAILER_LEN as u64)?
            .checked_sub(self.data_length)?
            .checked_sub(u64::from(self.header_len))
            .filter(|start| *start >= JOURNAL_START)
    }
}
