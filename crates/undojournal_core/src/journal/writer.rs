//! Undo record writer.

use super::layout::{JOURNAL_MAGIC, JOURNAL_START};
use super::record::{encode_record, Record, RecordKind};
use crate::config::WriterConfig;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, SubsecRound, Utc};
use tracing::debug;
use undojournal_storage::StorageBackend;

/// Appends undo records to a journal.
///
/// Each record is encoded into one buffer and appended with a single call,
/// so a crash leaves at most one torn record at the tail. With
/// [`WriterConfig::sync_on_write`] the backend is flushed before the call
/// returns, which must happen before the target is mutated.
pub struct JournalWriter<B: StorageBackend> {
    backend: B,
    config: WriterConfig,
}

impl<B: StorageBackend> JournalWriter<B> {
    /// Opens a journal for appending.
    ///
    /// An empty backend gets the reserved header; a non-empty one is
    /// appended to as is.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the backend holds fewer
    /// bytes than the header, or a storage error.
    pub fn create(mut backend: B, config: WriterConfig) -> CoreResult<Self> {
        let size = backend.size()?;
        if size == 0 {
            backend.append(&JOURNAL_MAGIC)?;
            if config.sync_on_write {
                backend.flush()?;
            }
        } else if size < JOURNAL_START {
            return Err(CoreError::invalid_argument(format!(
                "journal of {size} bytes is shorter than its {JOURNAL_START}-byte header"
            )));
        }
        Ok(Self { backend, config })
    }

    /// Records the pre-image of an in-place write.
    ///
    /// `pre_image` holds the target bytes at `target_offset` that the write
    /// will overwrite. Pass an empty slice for a write that lies entirely
    /// past the current end of the target.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the pre-image is longer than
    /// `u32::MAX` or its range overflows, or a storage error.
    pub fn record_write(
        &mut self,
        target_offset: u64,
        pre_image: &[u8],
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Record> {
        let data_length = u32::try_from(pre_image.len()).map_err(|_| {
            CoreError::invalid_argument(format!(
                "pre-image of {} bytes exceeds the maximum of {} bytes",
                pre_image.len(),
                u32::MAX
            ))
        })?;
        if target_offset.checked_add(u64::from(data_length)).is_none() {
            return Err(CoreError::invalid_argument(format!(
                "pre-image range {target_offset}+{data_length} overflows"
            )));
        }

        self.append(
            RecordKind::Write {
                target_offset,
                data_length,
            },
            timestamp,
            pre_image,
        )
    }

    /// Records a length change of the target.
    ///
    /// When the target shrinks, `truncated_tail` must hold exactly the
    /// `old_length - new_length` bytes being cut off; when it grows it must
    /// be empty.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the tail has the wrong
    /// length, or a storage error.
    pub fn record_length(
        &mut self,
        old_length: u64,
        new_length: u64,
        truncated_tail: &[u8],
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Record> {
        self.append(
            RecordKind::Length {
                old_length,
                new_length,
            },
            timestamp,
            truncated_tail,
        )
    }

    fn append(
        &mut self,
        kind: RecordKind,
        timestamp: DateTime<Utc>,
        payload: &[u8],
    ) -> CoreResult<Record> {
        // stored at microsecond precision
        let timestamp = timestamp.trunc_subsecs(6);
        let journal_offset = self.backend.size()?;
        let bytes = encode_record(journal_offset, &kind, timestamp, payload)?;
        let written_at = self.backend.append(&bytes)?;
        debug_assert_eq!(written_at, journal_offset);

        if self.config.sync_on_write {
            self.backend.flush()?;
        }

        debug!(
            offset = journal_offset,
            record_type = kind.record_type().name(),
            data_length = kind.data_length(),
            "appended undo record"
        );

        Ok(Record {
            journal_offset,
            timestamp,
            kind,
        })
    }

    /// Flushes the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    /// Returns the current journal size.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Consumes the writer, returning the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }
}
