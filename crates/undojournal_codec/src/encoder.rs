//! Field encoder.

use chrono::{DateTime, Utc};

/// Returns the number of bytes `value` occupies as a positive integer.
#[must_use]
pub const fn positive_len(value: u64) -> usize {
    if value == 0 {
        1
    } else {
        1 + byte_width(value)
    }
}

const fn byte_width(value: u64) -> usize {
    8 - (value.leading_zeros() as usize / 8)
}

/// Appends record fields to a byte buffer.
#[derive(Debug, Default)]
pub struct FieldEncoder {
    buf: Vec<u8>,
}

impl FieldEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Writes a single raw byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Writes a fixed-width little-endian `u32`.
    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a fixed-width little-endian `u64`.
    pub fn write_u64_le(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a timestamp as signed microseconds since the Unix epoch.
    ///
    /// Sub-microsecond precision is dropped.
    pub fn write_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.buf
            .extend_from_slice(&timestamp.timestamp_micros().to_le_bytes());
    }

    /// Writes a 32-bit positive integer.
    pub fn write_positive_u32(&mut self, value: u32) {
        self.write_positive_u64(u64::from(value));
    }

    /// Writes a 64-bit positive integer.
    pub fn write_positive_u64(&mut self, value: u64) {
        if value == 0 {
            self.buf.push(0);
            return;
        }
        let width = byte_width(value);
        // width is at most 8
        self.buf.push(width as u8);
        self.buf.extend_from_slice(&value.to_le_bytes()[..width]);
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the encoder, returning the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
