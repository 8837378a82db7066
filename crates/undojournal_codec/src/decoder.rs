//! Field decoder.

use crate::error::{CodecError, CodecResult};
use crate::TIMESTAMP_LEN;
use chrono::{DateTime, Utc};

/// Reads record fields from a byte slice.
///
/// The decoder keeps an explicit position into the slice; every read
/// advances it by exactly the number of bytes consumed. A failed read leaves
/// the position unchanged.
pub struct FieldDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldDecoder<'a> {
    /// Creates a decoder positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` when every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads the raw record-type tag.
    ///
    /// With `allow_eof`, an exhausted input yields `Ok(None)` instead of an
    /// error. Interpreting the byte is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if no byte remains and
    /// `allow_eof` is false.
    pub fn read_record_type(&mut self, allow_eof: bool) -> CodecResult<Option<u8>> {
        if allow_eof && self.is_empty() {
            return Ok(None);
        }
        self.read_u8().map(Some)
    }

    /// Reads a single raw byte.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] on empty input.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a fixed-width little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if fewer than 4 bytes remain.
    pub fn read_u32_le(&mut self) -> CodecResult<u32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads a fixed-width little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if fewer than 8 bytes remain.
    pub fn read_u64_le(&mut self) -> CodecResult<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads a timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 8 bytes remain or the value is outside
    /// the range `chrono` can represent.
    pub fn read_timestamp(&mut self) -> CodecResult<DateTime<Utc>> {
        let start = self.pos;
        let mut bytes = [0u8; TIMESTAMP_LEN];
        bytes.copy_from_slice(self.take(TIMESTAMP_LEN)?);
        let micros = i64::from_le_bytes(bytes);
        DateTime::from_timestamp_micros(micros).ok_or_else(|| {
            self.pos = start;
            CodecError::TimestampOutOfRange { micros }
        })
    }

    /// Reads a 32-bit positive integer.
    ///
    /// # Errors
    ///
    /// Returns an error on short input, a width above 4 or a non-canonical
    /// encoding.
    pub fn read_positive_u32(&mut self) -> CodecResult<u32> {
        // width <= 4 guarantees the value fits
        self.read_positive(4).map(|v| v as u32)
    }

    /// Reads a 64-bit positive integer.
    ///
    /// # Errors
    ///
    /// Returns an error on short input, a width above 8 or a non-canonical
    /// encoding.
    pub fn read_positive_u64(&mut self) -> CodecResult<u64> {
        self.read_positive(8)
    }

    fn read_positive(&mut self, max_width: u8) -> CodecResult<u64> {
        let start = self.pos;
        let width = self.read_u8()?;
        if width == 0 {
            return Ok(0);
        }
        if width > max_width {
            self.pos = start;
            return Err(CodecError::InvalidWidth {
                width,
                max: max_width,
            });
        }
        let bytes = match self.take(usize::from(width)) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.pos = start;
                // the whole field, width byte included
                return Err(CodecError::UnexpectedEof {
                    needed: 1 + usize::from(width),
                    available: self.remaining(),
                });
            }
        };
        if bytes[bytes.len() - 1] == 0 {
            self.pos = start;
            return Err(CodecError::NonCanonical { width });
        }
        let mut le = [0u8; 8];
        le[..bytes.len()].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(le))
    }
}
