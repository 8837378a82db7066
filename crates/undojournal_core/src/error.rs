//! Error types for UndoJournal core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while reading or writing the journal.
///
/// Scans never retry and never return a partially decoded record; which
/// errors are recoverable (for example discarding a torn tail after
/// [`CoreError::TruncatedJournal`]) is the caller's decision.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] undojournal_storage::StorageError),

    /// A cursor outside `[JOURNAL_START, journal_len]` was supplied.
    #[error("invalid cursor {cursor} (journal length {journal_len})")]
    InvalidCursor {
        /// The rejected cursor.
        cursor: u64,
        /// Journal length at the time of the call.
        journal_len: u64,
    },

    /// Decoded fields violate the record's structural invariants.
    #[error("corrupt record at offset {offset}: {message}")]
    CorruptRecord {
        /// Offset the scan was decoding from.
        offset: u64,
        /// Description of the violation.
        message: String,
    },

    /// A record extends past the end of the journal.
    #[error("truncated journal: record at {offset} ends at {record_end}, journal length {journal_len}")]
    TruncatedJournal {
        /// Start of the incomplete record.
        offset: u64,
        /// Where the record claims to (at least) end.
        record_end: u64,
        /// Current journal length.
        journal_len: u64,
    },

    /// Tag byte outside the known record types.
    #[error("unrecognized record type {tag} at offset {offset}")]
    UnrecognizedRecordType {
        /// The tag byte that was read.
        tag: u8,
        /// Offset of the tag byte.
        offset: u64,
    },

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt record error.
    pub fn corrupt_record(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that describe the journal contents rather
    /// than the call or the storage layer.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptRecord { .. }
                | Self::TruncatedJournal { .. }
                | Self::UnrecognizedRecordType { .. }
        )
    }
}
