//! Journal fixtures.
//!
//! Provides builders for in-memory journals, file-backed journals in a
//! temporary directory, and a helper that applies a pre-image back onto a
//! target buffer.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use undojournal_core::{JournalWriter, Record, RecordKind, WriterConfig};
use undojournal_storage::{AsyncFileBackend, FileBackend, InMemoryBackend};

/// Microseconds since the epoch used as the base of fixture timestamps.
pub const BASE_TIMESTAMP_MICROS: i64 = 1_700_000_000_000_000;

/// Returns a deterministic timestamp `micros` after [`BASE_TIMESTAMP_MICROS`].
///
/// # Panics
///
/// Panics if the result is outside the range `chrono` can represent.
#[must_use]
pub fn timestamp(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(BASE_TIMESTAMP_MICROS + micros)
        .expect("fixture timestamp out of range")
}

/// A complete journal image with the records that were written into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltJournal {
    /// Raw journal bytes, header included.
    pub bytes: Vec<u8>,
    /// Records in append order.
    pub records: Vec<Record>,
    /// Payload of each record, in the same order.
    pub payloads: Vec<Vec<u8>>,
}

impl BuiltJournal {
    /// Journal length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns `true` if the journal holds only its header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns an in-memory backend over a copy of the bytes.
    #[must_use]
    pub fn backend(&self) -> InMemoryBackend {
        InMemoryBackend::with_data(self.bytes.clone())
    }

    /// Returns the bytes cut off at `len`, as a crash mid-append would leave
    /// them.
    #[must_use]
    pub fn torn_at(&self, len: usize) -> Vec<u8> {
        self.bytes[..len.min(self.bytes.len())].to_vec()
    }
}

/// Builds an in-memory journal record by record.
///
/// Timestamps advance by one millisecond per record.
///
/// # Example
///
/// ```rust
/// use undojournal_testkit::JournalBuilder;
///
/// let mut builder = JournalBuilder::new();
/// builder.write(10, b"old").length(20, 30, &[]);
/// let journal = builder.finish();
/// assert_eq!(journal.records.len(), 2);
/// ```
pub struct JournalBuilder {
    writer: JournalWriter<InMemoryBackend>,
    records: Vec<Record>,
    payloads: Vec<Vec<u8>>,
    clock: i64,
}

impl JournalBuilder {
    /// Creates a builder over an empty journal.
    ///
    /// # Panics
    ///
    /// Panics if the journal header cannot be written.
    #[must_use]
    pub fn new() -> Self {
        let config = WriterConfig::default().sync_on_write(false);
        let writer = JournalWriter::create(InMemoryBackend::new(), config)
            .expect("failed to create in-memory journal");
        Self {
            writer,
            records: Vec::new(),
            payloads: Vec::new(),
            clock: 0,
        }
    }

    /// Appends a Write record.
    ///
    /// # Panics
    ///
    /// Panics if the writer rejects the record.
    pub fn write(&mut self, target_offset: u64, pre_image: &[u8]) -> &mut Self {
        let ts = self.tick();
        let record = self
            .writer
            .record_write(target_offset, pre_image, ts)
            .expect("failed to append write record");
        self.push(record, pre_image);
        self
    }

    /// Appends a Length record.
    ///
    /// # Panics
    ///
    /// Panics if the writer rejects the record.
    pub fn length(&mut self, old_length: u64, new_length: u64, truncated_tail: &[u8]) -> &mut Self {
        let ts = self.tick();
        let record = self
            .writer
            .record_length(old_length, new_length, truncated_tail, ts)
            .expect("failed to append length record");
        self.push(record, truncated_tail);
        self
    }

    /// Finishes the journal.
    #[must_use]
    pub fn finish(self) -> BuiltJournal {
        BuiltJournal {
            bytes: self.writer.into_inner().data(),
            records: self.records,
            payloads: self.payloads,
        }
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1_000;
        timestamp(self.clock)
    }

    fn push(&mut self, record: Record, payload: &[u8]) {
        self.records.push(record);
        self.payloads.push(payload.to_vec());
    }
}

impl Default for JournalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A journal file in a temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct TempJournal {
    _dir: TempDir,
    path: PathBuf,
}

impl TempJournal {
    /// Writes `bytes` to a new journal file.
    ///
    /// # Panics
    ///
    /// Panics if the directory or file cannot be created.
    #[must_use]
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let path = dir.path().join("target.journal");
        std::fs::write(&path, bytes).expect("failed to write journal file");
        Self { _dir: dir, path }
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file with the blocking backend.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be opened.
    #[must_use]
    pub fn open(&self) -> FileBackend {
        FileBackend::open(&self.path).expect("failed to open journal file")
    }

    /// Opens the file with the tokio backend.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be opened.
    pub async fn open_async(&self) -> AsyncFileBackend {
        AsyncFileBackend::open(&self.path)
            .await
            .expect("failed to open journal file")
    }
}

/// Runs `f` with a temporary journal file holding `bytes`.
pub fn with_temp_journal<F, R>(bytes: &[u8], f: F) -> R
where
    F: FnOnce(&TempJournal) -> R,
{
    let journal = TempJournal::with_bytes(bytes);
    f(&journal)
}

/// Undoes the mutation `record` describes on `target`.
///
/// Applying every record of a journal newest first restores the target to
/// its state before the first record.
pub fn apply_undo(target: &mut Vec<u8>, record: &Record, payload: &[u8]) {
    match record.kind {
        RecordKind::Write {
            target_offset,
            data_length,
        } => {
            let start = target_offset as usize;
            if data_length == 0 {
                target.truncate(start);
            } else {
                target[start..start + payload.len()].copy_from_slice(payload);
            }
        }
        RecordKind::Length {
            old_length,
            new_length,
        } => {
            if new_length < old_length {
                target.truncate(new_length as usize);
                target.extend_from_slice(payload);
            } else {
                target.truncate(old_length as usize);
            }
        }
    }
}
