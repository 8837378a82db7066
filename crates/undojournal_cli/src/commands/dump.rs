//! Dump command implementation.

use serde::Serialize;
use std::path::Path;
use tracing::debug;
use undojournal_core::{JournalReader, Record, RecordKind};
use undojournal_storage::{FileBackend, StorageBackend};

/// Undo record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset of the record in the journal.
    pub offset: u64,
    /// Offset one past the record's last byte.
    pub end_offset: u64,
    /// Record type.
    pub record_type: &'static str,
    /// When the record was logged, RFC 3339.
    pub timestamp: String,
    /// Target offset of the overwritten range (Write only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_offset: Option<u64>,
    /// Target length before the change (Length only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_length: Option<u64>,
    /// Target length after the change (Length only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_length: Option<u64>,
    /// Pre-image size in bytes.
    pub data_length: u64,
}

impl From<&Record> for RecordInfo {
    fn from(record: &Record) -> Self {
        let (target_offset, old_length, new_length) = match record.kind {
            RecordKind::Write { target_offset, .. } => (Some(target_offset), None, None),
            RecordKind::Length {
                old_length,
                new_length,
            } => (None, Some(old_length), Some(new_length)),
        };
        Self {
            offset: record.journal_offset,
            end_offset: record.end_offset(),
            record_type: record.record_type().name(),
            timestamp: record.timestamp.to_rfc3339(),
            target_offset,
            old_length,
            new_length,
            data_length: record.data_length(),
        }
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    reverse: bool,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err("Journal file not found".into());
    }

    let backend = FileBackend::open_read_only(path)?;
    let records = collect_records(backend, reverse, limit)?;
    debug!(path = %path.display(), records = records.len(), "collected undo records");

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Walks the journal from its end and returns up to `limit` records.
///
/// Records come back oldest first unless `reverse` is set.
pub fn collect_records<B: StorageBackend>(
    backend: B,
    reverse: bool,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let max_records = limit.unwrap_or(usize::MAX);
    let mut reader = JournalReader::new(backend);
    reader.seek_end()?;

    let mut records = Vec::new();
    for record in reader.backward() {
        if reverse && records.len() >= max_records {
            break;
        }
        records.push(RecordInfo::from(&record?));
    }

    if !reverse {
        records.reverse();
        records.truncate(max_records);
    }

    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Undo Records ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        print!(
            "[{:08}] {:6} {}",
            record.offset, record.record_type, record.timestamp
        );

        if let Some(target_offset) = record.target_offset {
            print!(" target_offset={}", target_offset);
        }
        if let (Some(old), Some(new)) = (record.old_length, record.new_length) {
            print!(" length={}->{}", old, new);
        }
        print!(" data={} bytes", record.data_length);

        println!();
    }
}
