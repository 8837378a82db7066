//! Position-keeping journal readers.
//!
//! These wrap a backend and a [`Scanner`] behind a single journal position,
//! the way a rollback orchestrator consumes the journal. The position only
//! moves when a scan succeeds.

use super::driver::Scanner;
use super::layout::JOURNAL_START;
use super::record::Record;
use super::scan::{ScanBuffer, Scanned};
use crate::config::ScanConfig;
use crate::error::{CoreError, CoreResult};
use undojournal_storage::{AsyncStorageBackend, StorageBackend};

fn payload_buffer(record: &Record) -> CoreResult<Vec<u8>> {
    let len = usize::try_from(record.data_length()).map_err(|_| {
        CoreError::invalid_argument(format!(
            "payload of {} bytes does not fit in memory",
            record.data_length()
        ))
    })?;
    Ok(vec![0u8; len])
}

/// Blocking journal reader with a current position.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use undojournal_core::{JournalReader, JournalWriter, WriterConfig};
/// use undojournal_storage::InMemoryBackend;
///
/// let mut writer = JournalWriter::create(InMemoryBackend::new(), WriterConfig::default()).unwrap();
/// writer.record_write(0, b"old bytes", Utc::now()).unwrap();
///
/// let mut reader = JournalReader::new(writer.into_inner());
/// let record = reader.next_forward(64).unwrap().unwrap();
/// assert_eq!(reader.read_payload(&record).unwrap(), b"old bytes");
/// assert!(reader.next_forward(64).unwrap().is_none());
/// ```
pub struct JournalReader<B> {
    backend: B,
    position: u64,
    scanner: Scanner,
    scratch: ScanBuffer,
}

impl<B: StorageBackend> JournalReader<B> {
    /// Creates a reader positioned at [`JOURNAL_START`].
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ScanConfig::default())
    }

    /// Creates a reader with a custom scan configuration.
    pub fn with_config(backend: B, config: ScanConfig) -> Self {
        Self {
            backend,
            position: JOURNAL_START,
            scanner: Scanner::new(config),
            scratch: ScanBuffer::new(),
        }
    }

    /// Current position: a record boundary.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves to `offset`, which must be a record boundary.
    ///
    /// Only the range is checked here; a misplaced offset surfaces as an
    /// error on the next scan.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCursor`] if `offset` is before
    /// [`JOURNAL_START`] or past the end of the journal.
    pub fn seek(&mut self, offset: u64) -> CoreResult<()> {
        let journal_len = self.backend.size()?;
        if offset < JOURNAL_START || offset > journal_len {
            return Err(CoreError::InvalidCursor {
                cursor: offset,
                journal_len,
            });
        }
        self.position = offset;
        Ok(())
    }

    /// Moves to the end of the journal, ready for backward scans.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is shorter than its header.
    pub fn seek_end(&mut self) -> CoreResult<u64> {
        let end = self.backend.size()?;
        self.seek(end)?;
        Ok(end)
    }

    /// Decodes the record at the current position and advances past it.
    ///
    /// # Errors
    ///
    /// See [`Scanner::forward`]. The position is unchanged on error.
    pub fn next_forward(&mut self, expected_target_length: u64) -> CoreResult<Option<Record>> {
        let scanned = self.scanner.forward(
            &self.backend,
            self.position,
            expected_target_length,
            Some(&mut self.scratch),
        )?;
        Ok(self.commit(scanned))
    }

    /// Decodes the record ending at the current position and rewinds to its
    /// start.
    ///
    /// # Errors
    ///
    /// See [`Scanner::backward`]. The position is unchanged on error.
    pub fn next_backward(&mut self) -> CoreResult<Option<Record>> {
        let scanned = self
            .scanner
            .backward(&self.backend, self.position, Some(&mut self.scratch))?;
        Ok(self.commit(scanned))
    }

    fn commit(&mut self, scanned: Option<Scanned>) -> Option<Record> {
        scanned.map(|Scanned { record, cursor }| {
            self.position = cursor;
            record
        })
    }

    /// Reads the pre-image bytes stored in `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be read.
    pub fn read_payload(&self, record: &Record) -> CoreResult<Vec<u8>> {
        let mut payload = payload_buffer(record)?;
        self.backend.read_at(record.payload_offset(), &mut payload)?;
        Ok(payload)
    }

    /// Returns an iterator of records from the current position towards
    /// the start of the journal, newest first.
    pub fn backward(&mut self) -> Backward<'_, B> {
        Backward {
            reader: self,
            finished: false,
        }
    }

    /// Returns a reference to the backend.
    pub fn get_ref(&self) -> &B {
        &self.backend
    }

    /// Consumes the reader, returning the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }
}

/// Iterator over records in rollback order.
///
/// Stops after the first error.
pub struct Backward<'a, B: StorageBackend> {
    reader: &'a mut JournalReader<B>,
    finished: bool,
}

impl<B: StorageBackend> Iterator for Backward<'_, B> {
    type Item = CoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.next_backward() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Async journal reader with a current position.
///
/// If a scan future is dropped before completing, the position stays where
/// it was; call [`AsyncJournalReader::seek`] before relying on it again.
pub struct AsyncJournalReader<B> {
    backend: B,
    position: u64,
    scanner: Scanner,
    scratch: ScanBuffer,
}

impl<B: AsyncStorageBackend> AsyncJournalReader<B> {
    /// Creates a reader positioned at [`JOURNAL_START`].
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ScanConfig::default())
    }

    /// Creates a reader with a custom scan configuration.
    pub fn with_config(backend: B, config: ScanConfig) -> Self {
        Self {
            backend,
            position: JOURNAL_START,
            scanner: Scanner::new(config),
            scratch: ScanBuffer::new(),
        }
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves to `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCursor`] if `offset` is before
    /// [`JOURNAL_START`] or past the end of the journal.
    pub async fn seek(&mut self, offset: u64) -> CoreResult<()> {
        let journal_len = self.backend.size().await?;
        if offset < JOURNAL_START || offset > journal_len {
            return Err(CoreError::InvalidCursor {
                cursor: offset,
                journal_len,
            });
        }
        self.position = offset;
        Ok(())
    }

    /// Moves to the end of the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is shorter than its header.
    pub async fn seek_end(&mut self) -> CoreResult<u64> {
        let end = self.backend.size().await?;
        self.seek(end).await?;
        Ok(end)
    }

    /// Async form of [`JournalReader::next_forward`].
    ///
    /// # Errors
    ///
    /// See [`Scanner::forward`].
    pub async fn next_forward(
        &mut self,
        expected_target_length: u64,
    ) -> CoreResult<Option<Record>> {
        let scanned = self
            .scanner
            .forward_async(
                &self.backend,
                self.position,
                expected_target_length,
                Some(&mut self.scratch),
            )
            .await?;
        Ok(scanned.map(|Scanned { record, cursor }| {
            self.position = cursor;
            record
        }))
    }

    /// Async form of [`JournalReader::next_backward`].
    ///
    /// # Errors
    ///
    /// See [`Scanner::backward`].
    pub async fn next_backward(&mut self) -> CoreResult<Option<Record>> {
        let scanned = self
            .scanner
            .backward_async(&self.backend, self.position, Some(&mut self.scratch))
            .await?;
        Ok(scanned.map(|Scanned { record, cursor }| {
            self.position = cursor;
            record
        }))
    }

    /// Reads the pre-image bytes stored in `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be read.
    pub async fn read_payload(&self, record: &Record) -> CoreResult<Vec<u8>> {
        let mut payload = payload_buffer(record)?;
        self.backend
            .read_at(record.payload_offset(), &mut payload)
            .await?;
        Ok(payload)
    }

    /// Consumes the reader, returning the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterConfig;
    use crate::journal::record::RecordKind;
    use crate::journal::writer::JournalWriter;
    use chrono::{TimeZone, Utc};
    use undojournal_storage::InMemoryBackend;

    fn sample_journal() -> InMemoryBackend {
        let ts = Utc.with_ymd_and_hms(2022, 8, 1, 0, 0, 0).unwrap();
        let mut writer =
            JournalWriter::create(InMemoryBackend::new(), WriterConfig::default()).unwrap();
        writer.record_write(10, b"abcde", ts).unwrap();
        writer.record_length(100, 40, &[0xEE; 60], ts).unwrap();
        writer.record_write(40, &[], ts).unwrap();
        writer.into_inner()
    }

    #[test]
    fn forward_then_backward() {
        let mut reader = JournalReader::new(sample_journal());

        let first = reader.next_forward(100).unwrap().unwrap();
        let second = reader.next_forward(100).unwrap().unwrap();
        let third = reader.next_forward(40).unwrap().unwrap();
        assert!(reader.next_forward(40).unwrap().is_none());
        assert_eq!(reader.position(), third.end_offset());

        assert_eq!(reader.next_backward().unwrap(), Some(third));
        assert_eq!(reader.next_backward().unwrap(), Some(second));
        assert_eq!(reader.next_backward().unwrap(), Some(first));
        assert_eq!(reader.next_backward().unwrap(), None);
        assert_eq!(reader.position(), JOURNAL_START);
    }

    #[test]
    fn backward_iterator_yields_rollback_order() {
        let mut reader = JournalReader::new(sample_journal());
        reader.seek_end().unwrap();

        let kinds: Vec<_> = reader
            .backward()
            .map(|r| r.unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Write {
                    target_offset: 40,
                    data_length: 0
                },
                RecordKind::Length {
                    old_length: 100,
                    new_length: 40
                },
                RecordKind::Write {
                    target_offset: 10,
                    data_length: 5
                },
            ]
        );
    }

    #[test]
    fn payloads_are_pre_images() {
        let mut reader = JournalReader::new(sample_journal());
        reader.seek_end().unwrap();
        let records: Vec<_> = reader.backward().collect::<CoreResult<_>>().unwrap();

        assert!(reader.read_payload(&records[0]).unwrap().is_empty());
        assert_eq!(reader.read_payload(&records[1]).unwrap(), vec![0xEE; 60]);
        assert_eq!(reader.read_payload(&records[2]).unwrap(), b"abcde");
    }

    #[test]
    fn failed_scan_keeps_position() {
        let mut reader = JournalReader::new(sample_journal());
        // 10 + 5 does not fit a target of 12
        assert!(reader.next_forward(12).is_err());
        assert_eq!(reader.position(), JOURNAL_START);
        assert!(reader.next_forward(100).unwrap().is_some());
    }

    #[test]
    fn seek_rejects_out_of_range() {
        let mut reader = JournalReader::new(sample_journal());
        let len = StorageBackend::size(reader.get_ref()).unwrap();
        assert!(matches!(
            reader.seek(3),
            Err(CoreError::InvalidCursor { cursor: 3, .. })
        ));
        assert!(matches!(
            reader.seek(len + 1),
            Err(CoreError::InvalidCursor { .. })
        ));
        assert!(reader.seek(len).is_ok());
    }

    #[test]
    fn backward_iterator_stops_after_error() {
        let mut bytes = sample_journal().data();
        let last = bytes.len() - 1;
        bytes[last] = 9;
        let mut reader = JournalReader::new(InMemoryBackend::with_data(bytes));
        reader.seek_end().unwrap();

        let mut iter = reader.backward();
        assert!(matches!(
            iter.next(),
            Some(Err(CoreError::UnrecognizedRecordType { tag: 9, .. }))
        ));
        assert!(iter.next().is_none());
    }

    #[tokio::test]
    async fn async_reader_matches_sync_reader() {
        let backend = sample_journal();
        let mut sync_reader = JournalReader::new(InMemoryBackend::with_data(backend.data()));
        let mut async_reader = AsyncJournalReader::new(backend);

        sync_reader.seek_end().unwrap();
        async_reader.seek_end().await.unwrap();

        loop {
            let expected = sync_reader.next_backward().unwrap();
            let actual = async_reader.next_backward().await.unwrap();
            assert_eq!(expected, actual);
            assert_eq!(sync_reader.position(), async_reader.position());
            let Some(record) = actual else { break };
            assert_eq!(
                sync_reader.read_payload(&record).unwrap(),
                async_reader.read_payload(&record).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn async_forward_scan() {
        let mut reader = AsyncJournalReader::new(sample_journal());
        let first = reader.next_forward(100).await.unwrap().unwrap();
        assert_eq!(first.journal_offset, JOURNAL_START);
        assert_eq!(reader.position(), first.end_offset());
        assert!(reader.seek(2).await.is_err());
    }

    #[test]
    fn file_backed_reader_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.journal");
        {
            let backend = undojournal_storage::FileBackend::open(&path).unwrap();
            let ts = Utc.with_ymd_and_hms(2022, 8, 1, 0, 0, 0).unwrap();
            let mut writer = JournalWriter::create(backend, WriterConfig::default()).unwrap();
            writer.record_write(3, b"xyz", ts).unwrap();
            writer.record_length(10, 4, b"abcdef", ts).unwrap();
        }

        let backend = undojournal_storage::FileBackend::open_read_only(&path).unwrap();
        let mut reader = JournalReader::new(backend);
        reader.seek_end().unwrap();
        let records: Vec<Record> = reader.backward().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(reader.read_payload(&records[0]).unwrap(), b"abcdef");
        assert_eq!(reader.read_payload(&records[1]).unwrap(), b"xyz");
    }

    proptest::proptest! {
        #[test]
        fn written_records_scan_back(pre_images in proptest::collection::vec(
            proptest::collection::vec(proptest::num::u8::ANY, 0..300), 1..12
        )) {
            let ts = Utc.with_ymd_and_hms(2022, 8, 1, 0, 0, 0).unwrap();
            let mut writer =
                JournalWriter::create(InMemoryBackend::new(), WriterConfig::default()).unwrap();
            let mut written = Vec::new();
            for (i, pre_image) in pre_images.iter().enumerate() {
                written.push(writer.record_write(i as u64 * 1_000, pre_image, ts).unwrap());
            }

            let mut reader = JournalReader::new(writer.into_inner());
            reader.seek_end().unwrap();
            let newest_first: Vec<Record> = reader.backward().map(Result::unwrap).collect();
            written.reverse();
            proptest::prop_assert_eq!(&newest_first, &written);
            for (record, pre_image) in newest_first.iter().zip(pre_images.iter().rev()) {
                proptest::prop_assert_eq!(&reader.read_payload(record).unwrap(), pre_image);
            }
        }
    }
}
