//! Sans-IO forward and backward scan state machines.
//!
//! A scan never touches storage itself. It starts by asking for a byte range
//! ([`ScanStep::Read`]), is resumed with exactly those bytes, and eventually
//! finishes with [`ScanStep::Done`]. The blocking and async drivers in
//! `driver.rs` differ only in how they perform the reads.
//!
//! Checksum verification reads the payload in chunks of at most
//! [`SCRATCH_LEN`] bytes, one step each, so the async driver yields between
//! chunks of a large record.

use super::layout::{
    record_hasher, record_len, Trailer, JOURNAL_START, MAX_HEADER_LEN, MIN_HEADER_LEN,
    TRAILER_LEN,
};
use super::record::{decode_header, HeaderError, Record, RecordKind, RecordType};
use crate::config::ScanConfig;
use crate::error::{CoreError, CoreResult};
use crc32fast::Hasher;
use tracing::{debug, trace, warn};
use undojournal_codec::CodecError;

/// Size of the scratch buffer, and of the payload chunks a checksum is
/// computed over.
pub const SCRATCH_LEN: usize = 512;

const _: () = assert!(SCRATCH_LEN >= MAX_HEADER_LEN && SCRATCH_LEN >= TRAILER_LEN);

/// Reusable scratch space for field decoding.
///
/// Pass one to the scan entry points to avoid a per-call buffer. It holds
/// no state between calls and may be reused sequentially, but not by two
/// scans at once.
#[derive(Debug, Clone)]
pub struct ScanBuffer([u8; SCRATCH_LEN]);

impl Default for ScanBuffer {
    fn default() -> Self {
        Self([0; SCRATCH_LEN])
    }
}

impl ScanBuffer {
    /// Creates a zeroed buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn window(&mut self, len: usize) -> &mut [u8] {
        &mut self.0[..len]
    }
}

/// A successfully decoded record and the cursor after the scan.
///
/// Forward scans leave `cursor` at the start of the next record; backward
/// scans leave it at `record.journal_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanned {
    /// The decoded record.
    pub record: Record,
    /// The new cursor.
    pub cursor: u64,
}

/// What a scan needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// Read exactly `len` bytes at `offset` and resume with them.
    Read {
        /// Journal offset to read from.
        offset: u64,
        /// Number of bytes; never more than [`SCRATCH_LEN`].
        len: usize,
    },
    /// The scan finished; `None` is the clean end/beginning sentinel.
    Done(Option<Scanned>),
}

/// A resumable scan over journal bytes.
pub trait ScanMachine {
    /// Validates the starting cursor and returns the first step.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor is unusable.
    fn start(&mut self) -> CoreResult<ScanStep>;

    /// Feeds the bytes requested by the previous [`ScanStep::Read`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not form a valid record.
    fn resume(&mut self, bytes: &[u8]) -> CoreResult<ScanStep>;
}

fn check_cursor(cursor: u64, journal_len: u64) -> CoreResult<()> {
    if cursor < JOURNAL_START || cursor > journal_len {
        return Err(CoreError::InvalidCursor {
            cursor,
            journal_len,
        });
    }
    Ok(())
}

fn unexpected_resume(offset: u64) -> CoreError {
    CoreError::corrupt_record(offset, "scan resumed after it finished")
}

fn check_trailer(record: &Record, header_len: usize, trailer: &Trailer) -> CoreResult<()> {
    let offset = record.journal_offset;
    if trailer.tag != record.record_type().as_byte() {
        return Err(CoreError::corrupt_record(
            offset,
            format!(
                "trailer tag {} does not match {} header",
                trailer.tag,
                record.record_type().name()
            ),
        ));
    }
    if usize::from(trailer.header_len) != header_len {
        return Err(CoreError::corrupt_record(
            offset,
            format!(
                "trailer header length {} does not match decoded {header_len}",
                trailer.header_len
            ),
        ));
    }
    if trailer.data_length != record.data_length() {
        return Err(CoreError::corrupt_record(
            offset,
            format!(
                "trailer data length {} does not match decoded {}",
                trailer.data_length,
                record.data_length()
            ),
        ));
    }
    Ok(())
}

/// Running checksum of a record, fed its payload one chunk per read.
struct PayloadCheck {
    hasher: Hasher,
    offset: u64,
    remaining: u64,
}

impl PayloadCheck {
    fn new(record: &Record, header: &[u8]) -> Self {
        let mut hasher = record_hasher(record.journal_offset);
        hasher.update(header);
        Self {
            hasher,
            offset: record.payload_offset(),
            remaining: record.data_length(),
        }
    }

    /// The next chunk to read, or `None` once the payload is consumed.
    fn next_read(&self) -> Option<ScanStep> {
        (self.remaining > 0).then(|| ScanStep::Read {
            offset: self.offset,
            // bounded by SCRATCH_LEN
            len: self.remaining.min(SCRATCH_LEN as u64) as usize,
        })
    }

    fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.offset += chunk.len() as u64;
        self.remaining = self.remaining.saturating_sub(chunk.len() as u64);
    }
}

fn check_checksum(record: &Record, trailer: &Trailer, check: PayloadCheck) -> CoreResult<()> {
    let computed = check.hasher.finalize();
    if computed != trailer.checksum {
        return Err(CoreError::corrupt_record(
            record.journal_offset,
            format!(
                "checksum mismatch: trailer has {:#010x}, record hashes to {computed:#010x}",
                trailer.checksum
            ),
        ));
    }
    Ok(())
}

/// Checks a record against the target length it was written over.
fn validate_against_target(record: &Record, expected_target_length: u64) -> CoreResult<()> {
    let offset = record.journal_offset;
    match record.kind {
        RecordKind::Write {
            target_offset,
            data_length,
        } => {
            if data_length == 0 {
                if target_offset < expected_target_length {
                    return Err(CoreError::corrupt_record(
                        offset,
                        format!(
                            "empty write at target offset {target_offset} lies inside target of length {expected_target_length}"
                        ),
                    ));
                }
                return Ok(());
            }
            if target_offset >= expected_target_length {
                return Err(CoreError::corrupt_record(
                    offset,
                    format!(
                        "target offset {target_offset} is not below target length {expected_target_length}"
                    ),
                ));
            }
            let end = target_offset.checked_add(u64::from(data_length));
            if !matches!(end, Some(end) if end <= expected_target_length) {
                return Err(CoreError::corrupt_record(
                    offset,
                    format!(
                        "pre-image {target_offset}+{data_length} exceeds target length {expected_target_length}"
                    ),
                ));
            }
        }
        RecordKind::Length { old_length, .. } => {
            if old_length < expected_target_length {
                return Err(CoreError::corrupt_record(
                    offset,
                    format!(
                        "old length {old_length} is below target length {expected_target_length}"
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Checks invariants that hold regardless of the target length.
fn validate_structure(record: &Record) -> CoreResult<()> {
    if let RecordKind::Write {
        target_offset,
        data_length,
    } = record.kind
    {
        if target_offset.checked_add(u64::from(data_length)).is_none() {
            return Err(CoreError::corrupt_record(
                record.journal_offset,
                format!("pre-image {target_offset}+{data_length} overflows"),
            ));
        }
    }
    Ok(())
}

enum ForwardState {
    Header,
    Payload {
        record: Record,
        header_len: usize,
        next: u64,
        check: PayloadCheck,
    },
    Trailer {
        record: Record,
        header_len: usize,
        next: u64,
        check: PayloadCheck,
    },
    Finished,
}

/// Decodes the record starting at a cursor.
pub struct ForwardScan {
    cursor: u64,
    journal_len: u64,
    expected_target_length: u64,
    verify_trailer: bool,
    state: ForwardState,
}

impl ForwardScan {
    /// Creates a scan of the record at `cursor`.
    ///
    /// `expected_target_length` is the length the target stream had when
    /// the record was written.
    #[must_use]
    pub fn new(
        cursor: u64,
        journal_len: u64,
        expected_target_length: u64,
        config: &ScanConfig,
    ) -> Self {
        Self {
            cursor,
            journal_len,
            expected_target_length,
            verify_trailer: config.verify_trailer,
            state: ForwardState::Header,
        }
    }

    fn truncated(&self, record_end: u64) -> CoreError {
        warn!(
            offset = self.cursor,
            record_end,
            journal_len = self.journal_len,
            "journal ends mid-record"
        );
        CoreError::TruncatedJournal {
            offset: self.cursor,
            record_end,
            journal_len: self.journal_len,
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> CoreResult<ScanStep> {
        let start = self.cursor;
        let (record, header_len) = match decode_header(bytes, start) {
            Ok(decoded) => decoded,
            Err(HeaderError::UnknownTag(tag)) => {
                warn!(offset = start, tag, "unrecognized record type");
                return Err(CoreError::UnrecognizedRecordType { tag, offset: start });
            }
            // The window only falls short of MAX_HEADER_LEN at the journal end.
            Err(HeaderError::Codec { at, error })
                if error.is_eof() && bytes.len() < MAX_HEADER_LEN =>
            {
                let needed = match error {
                    CodecError::UnexpectedEof { needed, .. } => needed,
                    _ => 1,
                };
                return Err(self.truncated(start + (at + needed) as u64));
            }
            Err(HeaderError::Codec { error, .. }) => {
                warn!(offset = start, %error, "undecodable record header");
                return Err(CoreError::corrupt_record(start, error.to_string()));
            }
        };

        validate_against_target(&record, self.expected_target_length).inspect_err(|e| {
            warn!(offset = start, error = %e, "record fails target validation");
        })?;

        let next = match record_len(header_len, record.data_length())
            .and_then(|len| start.checked_add(len))
        {
            Some(next) if next <= self.journal_len => next,
            Some(next) => return Err(self.truncated(next)),
            None => {
                return Err(CoreError::corrupt_record(
                    start,
                    "record size overflows the journal offset range",
                ))
            }
        };

        if self.verify_trailer {
            let check = PayloadCheck::new(&record, &bytes[..header_len]);
            return Ok(self.read_payload(record, header_len, next, check));
        }

        Ok(self.finish(record, next))
    }

    fn read_payload(
        &mut self,
        record: Record,
        header_len: usize,
        next: u64,
        check: PayloadCheck,
    ) -> ScanStep {
        if let Some(step) = check.next_read() {
            self.state = ForwardState::Payload {
                record,
                header_len,
                next,
                check,
            };
            return step;
        }
        self.state = ForwardState::Trailer {
            record,
            header_len,
            next,
            check,
        };
        ScanStep::Read {
            offset: next - TRAILER_LEN as u64,
            len: TRAILER_LEN,
        }
    }

    fn finish(&mut self, record: Record, next: u64) -> ScanStep {
        self.state = ForwardState::Finished;
        trace!(
            offset = record.journal_offset,
            record_type = record.record_type().name(),
            next,
            "scanned record forward"
        );
        ScanStep::Done(Some(Scanned {
            record,
            cursor: next,
        }))
    }
}

impl ScanMachine for ForwardScan {
    fn start(&mut self) -> CoreResult<ScanStep> {
        check_cursor(self.cursor, self.journal_len)?;

        let available = self.journal_len - self.cursor;
        if available == 0 {
            debug!(offset = self.cursor, "forward scan reached end of journal");
            self.state = ForwardState::Finished;
            return Ok(ScanStep::Done(None));
        }

        Ok(ScanStep::Read {
            offset: self.cursor,
            // bounded by MAX_HEADER_LEN
            len: available.min(MAX_HEADER_LEN as u64) as usize,
        })
    }

    fn resume(&mut self, bytes: &[u8]) -> CoreResult<ScanStep> {
        match std::mem::replace(&mut self.state, ForwardState::Finished) {
            ForwardState::Header => self.decode(bytes),
            ForwardState::Payload {
                record,
                header_len,
                next,
                mut check,
            } => {
                check.update(bytes);
                Ok(self.read_payload(record, header_len, next, check))
            }
            ForwardState::Trailer {
                record,
                header_len,
                next,
                check,
            } => {
                let trailer = Trailer::decode(bytes)
                    .map_err(|e| CoreError::corrupt_record(self.cursor, e.to_string()))?;
                check_trailer(&record, header_len, &trailer)
                    .and_then(|()| check_checksum(&record, &trailer, check))
                    .inspect_err(|e| {
                        warn!(offset = self.cursor, error = %e, "trailer mismatch");
                    })?;
                Ok(self.finish(record, next))
            }
            ForwardState::Finished => Err(unexpected_resume(self.cursor)),
        }
    }
}

enum BackwardState {
    Trailer,
    Header {
        start: u64,
        trailer: Trailer,
    },
    Payload {
        record: Record,
        trailer: Trailer,
        check: PayloadCheck,
    },
    Finished,
}

/// Decodes the record ending at a cursor.
pub struct BackwardScan {
    cursor: u64,
    journal_len: u64,
    state: BackwardState,
}

impl BackwardScan {
    /// Creates a scan of the record that ends at `cursor`.
    #[must_use]
    pub fn new(cursor: u64, journal_len: u64) -> Self {
        Self {
            cursor,
            journal_len,
            state: BackwardState::Trailer,
        }
    }

    fn corrupt(&self, message: impl Into<String>) -> CoreError {
        let err = CoreError::corrupt_record(self.cursor, message);
        warn!(cursor = self.cursor, error = %err, "backward scan hit corruption");
        err
    }

    fn locate(&mut self, bytes: &[u8]) -> CoreResult<ScanStep> {
        let trailer = Trailer::decode(bytes).map_err(|e| self.corrupt(e.to_string()))?;

        let Some(record_type) = RecordType::from_byte(trailer.tag) else {
            let offset = self.cursor - 1;
            warn!(offset, tag = trailer.tag, "unrecognized record type");
            return Err(CoreError::UnrecognizedRecordType {
                tag: trailer.tag,
                offset,
            });
        };

        let header_len = usize::from(trailer.header_len);
        if !(MIN_HEADER_LEN..=record_type.max_header_len()).contains(&header_len) {
            return Err(self.corrupt(format!(
                "trailer header length {header_len} is invalid for a {} record",
                record_type.name()
            )));
        }

        let Some(start) = trailer.record_start(self.cursor) else {
            return Err(self.corrupt(format!(
                "not enough data from the current offset for a {} record of {} payload bytes",
                record_type.name(),
                trailer.data_length
            )));
        };

        self.state = BackwardState::Header { start, trailer };
        Ok(ScanStep::Read {
            offset: start,
            len: header_len,
        })
    }

    fn decode(&mut self, start: u64, trailer: Trailer, bytes: &[u8]) -> CoreResult<ScanStep> {
        let (record, header_len) = match decode_header(bytes, start) {
            Ok(decoded) => decoded,
            Err(HeaderError::UnknownTag(tag)) => {
                warn!(offset = start, tag, "unrecognized record type");
                return Err(CoreError::UnrecognizedRecordType { tag, offset: start });
            }
            Err(HeaderError::Codec { error, .. }) => {
                return Err(self.corrupt(format!("header at {start}: {error}")));
            }
        };

        check_trailer(&record, header_len, &trailer).inspect_err(|e| {
            warn!(cursor = self.cursor, error = %e, "trailer does not match header");
        })?;
        validate_structure(&record)?;

        let check = PayloadCheck::new(&record, &bytes[..header_len]);
        self.read_payload(record, trailer, check)
    }

    fn read_payload(
        &mut self,
        record: Record,
        trailer: Trailer,
        check: PayloadCheck,
    ) -> CoreResult<ScanStep> {
        if let Some(step) = check.next_read() {
            self.state = BackwardState::Payload {
                record,
                trailer,
                check,
            };
            return Ok(step);
        }

        check_checksum(&record, &trailer, check).inspect_err(|e| {
            warn!(cursor = self.cursor, error = %e, "backward scan hit corruption");
        })?;

        trace!(
            offset = record.journal_offset,
            record_type = record.record_type().name(),
            "scanned record backward"
        );
        Ok(ScanStep::Done(Some(Scanned {
            record,
            cursor: record.journal_offset,
        })))
    }
}

impl ScanMachine for BackwardScan {
    fn start(&mut self) -> CoreResult<ScanStep> {
        check_cursor(self.cursor, self.journal_len)?;

        if self.cursor == JOURNAL_START {
            debug!("backward scan reached start of journal");
            self.state = BackwardState::Finished;
            return Ok(ScanStep::Done(None));
        }

        if self.cursor - JOURNAL_START < TRAILER_LEN as u64 {
            return Err(self.corrupt("not enough data from the current offset for a trailer"));
        }

        Ok(ScanStep::Read {
            offset: self.cursor - TRAILER_LEN as u64,
            len: TRAILER_LEN,
        })
    }

    fn resume(&mut self, bytes: &[u8]) -> CoreResult<ScanStep> {
        match std::mem::replace(&mut self.state, BackwardState::Finished) {
            BackwardState::Trailer => self.locate(bytes),
            BackwardState::Header { start, trailer } => self.decode(start, trailer, bytes),
            BackwardState::Payload {
                record,
                trailer,
                mut check,
            } => {
                check.update(bytes);
                self.read_payload(record, trailer, check)
            }
            BackwardState::Finished => Err(unexpected_resume(self.cursor)),
        }
    }
}
