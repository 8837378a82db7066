//! Blocking and async drivers for the scan machines.

use super::scan::{BackwardScan, ForwardScan, ScanBuffer, ScanMachine, ScanStep, Scanned};
use crate::config::ScanConfig;
use crate::error::CoreResult;
use undojournal_storage::{AsyncStorageBackend, StorageBackend};

fn drive<M, B>(
    machine: &mut M,
    journal: &B,
    scratch: &mut ScanBuffer,
) -> CoreResult<Option<Scanned>>
where
    M: ScanMachine,
    B: StorageBackend + ?Sized,
{
    let mut step = machine.start()?;
    loop {
        match step {
            ScanStep::Done(outcome) => return Ok(outcome),
            ScanStep::Read { offset, len } => {
                let window = scratch.window(len);
                journal.read_at(offset, window)?;
                step = machine.resume(window)?;
            }
        }
    }
}

async fn drive_async<M, B>(
    machine: &mut M,
    journal: &B,
    scratch: &mut ScanBuffer,
) -> CoreResult<Option<Scanned>>
where
    M: ScanMachine,
    B: AsyncStorageBackend + ?Sized,
{
    let mut step = machine.start()?;
    loop {
        match step {
            ScanStep::Done(outcome) => return Ok(outcome),
            ScanStep::Read { offset, len } => {
                let window = scratch.window(len);
                journal.read_at(offset, window).await?;
                step = machine.resume(window)?;
            }
        }
    }
}

/// Runs forward and backward scans against a journal backend.
///
/// Cursors are explicit: each call takes the cursor to scan from and
/// returns the new one inside [`Scanned`]. A failed or cancelled call hands
/// nothing back, so a caller-held cursor is never left half-advanced.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    /// Creates a scanner with the given configuration.
    #[must_use]
    pub const fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Returns the scanner configuration.
    #[must_use]
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Decodes the record starting at `cursor`.
    ///
    /// Returns `Ok(None)` when `cursor` is the end of the journal.
    ///
    /// # Errors
    ///
    /// - [`crate::CoreError::InvalidCursor`] if `cursor` is before
    ///   [`super::JOURNAL_START`] or past the end
    /// - [`crate::CoreError::UnrecognizedRecordType`] on an unknown tag
    /// - [`crate::CoreError::CorruptRecord`] if the record does not fit the
    ///   target length or its trailer disagrees with its header
    /// - [`crate::CoreError::TruncatedJournal`] if the record runs past the
    ///   end of the journal
    pub fn forward<B: StorageBackend + ?Sized>(
        &self,
        journal: &B,
        cursor: u64,
        expected_target_length: u64,
        scratch: Option<&mut ScanBuffer>,
    ) -> CoreResult<Option<Scanned>> {
        let journal_len = journal.size()?;
        let mut machine =
            ForwardScan::new(cursor, journal_len, expected_target_length, &self.config);
        let mut local;
        let scratch = match scratch {
            Some(scratch) => scratch,
            None => {
                local = ScanBuffer::new();
                &mut local
            }
        };
        drive(&mut machine, journal, scratch)
    }

    /// Decodes the record ending at `cursor`.
    ///
    /// Returns `Ok(None)` when `cursor` is [`super::JOURNAL_START`].
    ///
    /// # Errors
    ///
    /// - [`crate::CoreError::InvalidCursor`] if `cursor` is before
    ///   [`super::JOURNAL_START`] or past the end
    /// - [`crate::CoreError::UnrecognizedRecordType`] on an unknown tag
    /// - [`crate::CoreError::CorruptRecord`] if the trailer and header
    ///   disagree or the record would start before the journal start
    pub fn backward<B: StorageBackend + ?Sized>(
        &self,
        journal: &B,
        cursor: u64,
        scratch: Option<&mut ScanBuffer>,
    ) -> CoreResult<Option<Scanned>> {
        let journal_len = journal.size()?;
        let mut machine = BackwardScan::new(cursor, journal_len);
        let mut local;
        let scratch = match scratch {
            Some(scratch) => scratch,
            None => {
                local = ScanBuffer::new();
                &mut local
            }
        };
        drive(&mut machine, journal, scratch)
    }

    /// Async form of [`Scanner::forward`].
    ///
    /// Each read is a suspension point. Dropping the future cancels the scan
    /// without producing a record.
    ///
    /// # Errors
    ///
    /// Same as [`Scanner::forward`].
    pub async fn forward_async<B: AsyncStorageBackend + ?Sized>(
        &self,
        journal: &B,
        cursor: u64,
        expected_target_length: u64,
        scratch: Option<&mut ScanBuffer>,
    ) -> CoreResult<Option<Scanned>> {
        let journal_len = journal.size().await?;
        let mut machine =
            ForwardScan::new(cursor, journal_len, expected_target_length, &self.config);
        let mut local;
        let scratch = match scratch {
            Some(scratch) => scratch,
            None => {
                local = ScanBuffer::new();
                &mut local
            }
        };
        drive_async(&mut machine, journal, scratch).await
    }

    /// Async form of [`Scanner::backward`].
    ///
    /// # Errors
    ///
    /// Same as [`Scanner::backward`].
    pub async fn backward_async<B: AsyncStorageBackend + ?Sized>(
        &self,
        journal: &B,
        cursor: u64,
        scratch: Option<&mut ScanBuffer>,
    ) -> CoreResult<Option<Scanned>> {
        let journal_len = journal.size().await?;
        let mut machine = BackwardScan::new(cursor, journal_len);
        let mut local;
        let scratch = match scratch {
            Some(scratch) => scratch,
            None => {
                local = ScanBuffer::new();
                &mut local
            }
        };
        drive_async(&mut machine, journal, scratch).await
    }
}

/// Decodes the record starting at `cursor` with the default configuration.
///
/// # Errors
///
/// See [`Scanner::forward`].
pub fn scan_forward<B: StorageBackend + ?Sized>(
    journal: &B,
    cursor: u64,
    expected_target_length: u64,
    scratch: Option<&mut ScanBuffer>,
) -> CoreResult<Option<Scanned>> {
    Scanner::default().forward(journal, cursor, expected_target_length, scratch)
}

/// Decodes the record ending at `cursor`.
///
/// # Errors
///
/// See [`Scanner::backward`].
pub fn scan_backward<B: StorageBackend + ?Sized>(
    journal: &B,
    cursor: u64,
    scratch: Option<&mut ScanBuffer>,
) -> CoreResult<Option<Scanned>> {
    Scanner::default().backward(journal, cursor, scratch)
}

/// Async form of [`scan_forward`].
///
/// # Errors
///
/// See [`Scanner::forward`].
pub async fn scan_forward_async<B: AsyncStorageBackend + ?Sized>(
    journal: &B,
    cursor: u64,
    expected_target_length: u64,
    scratch: Option<&mut ScanBuffer>,
) -> CoreResult<Option<Scanned>> {
    Scanner::default()
        .forward_async(journal, cursor, expected_target_length, scratch)
        .await
}

/// Async form of [`scan_backward`].
///
/// # Errors
///
/// See [`Scanner::backward`].
pub async fn scan_backward_async<B: AsyncStorageBackend + ?Sized>(
    journal: &B,
    cursor: u64,
    scratch: Option<&mut ScanBuffer>,
) -> CoreResult<Option<Scanned>> {
    Scanner::default()
        .backward_async(journal, cursor, scratch)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::journal::layout::JOURNAL_MAGIC;
    use crate::journal::record::{encode_record, RecordKind, RecordType};
    use chrono::{TimeZone, Utc};
    use undojournal_storage::InMemoryBackend;

    const TRAILER_LEN_U64: u64 = crate::journal::TRAILER_LEN as u64;

    type Entry = (RecordKind, Vec<u8>);

    fn write(target_offset: u64, payload: &[u8]) -> Entry {
        let kind = RecordKind::Write {
            target_offset,
            data_length: payload.len() as u32,
        };
        (kind, payload.to_vec())
    }

    fn length(old_length: u64, new_length: u64) -> Entry {
        let kind = RecordKind::Length {
            old_length,
            new_length,
        };
        (kind, vec![0x5A; kind.data_length() as usize])
    }

    fn encode_at(journal_offset: u64, (kind, payload): &Entry) -> Vec<u8> {
        let ts = Utc.with_ymd_and_hms(2023, 11, 5, 9, 15, 0).unwrap();
        encode_record(journal_offset, kind, ts, payload).unwrap()
    }

    fn backend(entries: &[Entry]) -> InMemoryBackend {
        let mut bytes = JOURNAL_MAGIC.to_vec();
        for entry in entries {
            let record = encode_at(bytes.len() as u64, entry);
            bytes.extend_from_slice(&record);
        }
        InMemoryBackend::with_data(bytes)
    }

    /// A journal holding one already encoded, possibly damaged, record.
    fn backend_with(record: &[u8]) -> InMemoryBackend {
        let mut bytes = JOURNAL_MAGIC.to_vec();
        bytes.extend_from_slice(record);
        InMemoryBackend::with_data(bytes)
    }

    #[test]
    fn clean_eof_and_bof() {
        let journal = backend(&[]);
        assert_eq!(scan_forward(&journal, 8, 0, None).unwrap(), None);
        assert_eq!(scan_backward(&journal, 8, None).unwrap(), None);
    }

    #[test]
    fn growth_length_record_has_no_payload() {
        let record = encode_at(8, &length(1_000, 2_000));
        let journal = backend_with(&record);

        let scanned = scan_forward(&journal, 8, 1_000, None).unwrap().unwrap();
        assert_eq!(scanned.record.data_length(), 0);
        assert_eq!(
            scanned.cursor,
            8 + scanned.record.header_len() as u64 + TRAILER_LEN_U64
        );
        assert_eq!(scanned.cursor, 8 + record.len() as u64);
    }

    #[test]
    fn shrink_length_record_consumes_tail() {
        let journal = backend(&[length(2_000, 500)]);

        let scanned = scan_forward(&journal, 8, 2_000, None).unwrap().unwrap();
        assert_eq!(scanned.record.data_length(), 1_500);
        let metadata_end = scanned.record.payload_offset();
        assert_eq!(scanned.cursor - TRAILER_LEN_U64 - metadata_end, 1_500);
    }

    #[test]
    fn write_containment() {
        let journal = backend(&[write(100, &[1; 50])]);

        let scanned = scan_forward(&journal, 8, 200, None).unwrap().unwrap();
        assert_eq!(
            scanned.record.kind,
            RecordKind::Write {
                target_offset: 100,
                data_length: 50
            }
        );

        let err = scan_forward(&journal, 8, 120, None).unwrap_err();
        assert!(matches!(err, CoreError::CorruptRecord { offset: 8, .. }));
    }

    #[test]
    fn write_offset_must_be_inside_target() {
        let journal = backend(&[write(100, &[1; 5])]);
        let err = scan_forward(&journal, 8, 100, None).unwrap_err();
        assert!(matches!(err, CoreError::CorruptRecord { .. }));
    }

    #[test]
    fn length_old_length_must_cover_target() {
        let journal = backend(&[length(1_000, 10)]);
        let err = scan_forward(&journal, 8, 1_001, None).unwrap_err();
        assert!(matches!(err, CoreError::CorruptRecord { .. }));
    }

    #[test]
    fn unknown_tag_forward() {
        let mut record = encode_at(8, &write(0, &[9; 4]));
        record[0] = 2;
        let journal = backend_with(&record);

        let err = scan_forward(&journal, 8, 100, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnrecognizedRecordType { tag: 2, offset: 8 }
        ));
    }

    #[test]
    fn unknown_tag_backward() {
        let mut record = encode_at(8, &write(0, &[9; 4]));
        let last = record.len() - 1;
        record[last] = 7;
        let journal = backend_with(&record);
        let end = StorageBackend::size(&journal).unwrap();

        let err = scan_backward(&journal, end, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnrecognizedRecordType { tag: 7, offset } if offset == end - 1
        ));
    }

    #[test]
    fn truncated_payload() {
        let record = encode_at(8, &write(0, &[3; 100]));
        let header_len = RecordKind::Write {
            target_offset: 0,
            data_length: 100,
        }
        .header_len();
        // header plus 40 payload bytes
        let torn = record[..header_len + 40].to_vec();
        let journal = backend_with(&torn);

        let err = scan_forward(&journal, 8, 1_000, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TruncatedJournal { offset: 8, record_end, .. }
                if record_end == 8 + record.len() as u64
        ));
    }

    #[test]
    fn scratch_buffer_is_reusable() {
        let journal = backend(&[write(0, &[1; 8]), length(64, 60), write(60, &[])]);
        let mut scratch = ScanBuffer::new();

        let a = scan_forward(&journal, 8, 64, Some(&mut scratch)).unwrap().unwrap();
        let b = scan_forward(&journal, a.cursor, 64, Some(&mut scratch)).unwrap().unwrap();
        let c = scan_forward(&journal, b.cursor, 60, Some(&mut scratch)).unwrap().unwrap();
        assert_eq!(b.record.record_type(), RecordType::Length);
        assert_eq!(c.record.data_length(), 0);
        assert_eq!(scan_forward(&journal, c.cursor, 60, Some(&mut scratch)).unwrap(), None);

        let back = scan_backward(&journal, b.cursor, Some(&mut scratch)).unwrap().unwrap();
        assert_eq!(back.record, b.record);
    }

    #[tokio::test]
    async fn async_matches_sync() {
        let journal = backend(&[write(10, &[4; 20]), length(300, 100)]);

        let sync_first = scan_forward(&journal, 8, 300, None).unwrap().unwrap();
        let async_first = scan_forward_async(&journal, 8, 300, None).await.unwrap().unwrap();
        assert_eq!(sync_first, async_first);

        let end = AsyncStorageBackend::size(&journal).await.unwrap();
        let mut scratch = ScanBuffer::new();
        let last = scan_backward_async(&journal, end, Some(&mut scratch))
            .await
            .unwrap()
            .unwrap();
        let first = scan_backward_async(&journal, last.cursor, Some(&mut scratch))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.record, sync_first.record);
        assert_eq!(first.cursor, 8);
        assert_eq!(
            scan_backward_async(&journal, first.cursor, None).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn async_errors_match_sync() {
        let journal = backend(&[write(100, &[1; 50])]);
        let err = scan_forward_async(&journal, 8, 120, None).await.unwrap_err();
        assert!(matches!(err, CoreError::CorruptRecord { .. }));

        let err = scan_backward_async(&journal, 4, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCursor { cursor: 4, .. }));
    }

    #[tokio::test]
    async fn async_verifies_checksum_across_payload_chunks() {
        let entry = write(0, &[7; 2_000]);
        let journal = backend(&[entry.clone()]);
        let end = AsyncStorageBackend::size(&journal).await.unwrap();

        let forward = scan_forward_async(&journal, 8, 2_000, None).await.unwrap().unwrap();
        assert_eq!(forward.cursor, end);
        let backward = scan_backward_async(&journal, end, None).await.unwrap().unwrap();
        assert_eq!(backward.record, forward.record);

        // damage the last payload chunk only
        let mut record = encode_at(8, &entry);
        let at = record.len() - TRAILER_LEN_U64 as usize - 1;
        record[at] ^= 1;
        let journal = backend_with(&record);

        let err = scan_forward_async(&journal, 8, 2_000, None).await.unwrap_err();
        assert!(matches!(err, CoreError::CorruptRecord { offset: 8, .. }));
        let err = scan_backward_async(&journal, end, None).await.unwrap_err();
        assert!(matches!(err, CoreError::CorruptRecord { offset: 8, .. }));
    }
}
