//! Verify command implementation.

use std::path::Path;
use tracing::{debug, warn};
use undojournal_core::{CoreError, JournalReader, JOURNAL_MAGIC, JOURNAL_START};
use undojournal_storage::{FileBackend, StorageBackend};

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Journal size in bytes.
    pub journal_len: u64,
    /// Number of records that scanned cleanly.
    pub valid_records: usize,
    /// Pre-image bytes held by those records.
    pub payload_bytes: u64,
    /// First error hit, if any.
    pub error: Option<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying journal at {:?}", path);
    println!();

    if !path.exists() {
        return Err("Journal file not found".into());
    }

    let backend = FileBackend::open_read_only(path)?;
    let result = verify_journal(backend)?;

    println!("  Journal size: {} bytes", result.journal_len);
    println!("  Valid records: {}", result.valid_records);
    println!("  Pre-image bytes: {}", result.payload_bytes);
    if let Some(error) = &result.error {
        println!("  Error: {}", error);
    }

    println!();
    if result.is_ok() {
        println!("✓ Journal verification passed");
        Ok(())
    } else {
        println!("✗ Journal verification failed");
        Err("Verification failed".into())
    }
}

/// Checks the header and scans every record from the end back to the start.
///
/// Scan failures are reported in the result; `Err` is left for I/O errors
/// outside the scan.
pub fn verify_journal<B: StorageBackend>(
    backend: B,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let journal_len = backend.size()?;
    let mut result = VerifyResult {
        journal_len,
        valid_records: 0,
        payload_bytes: 0,
        error: None,
    };

    if journal_len < JOURNAL_START {
        result.error = Some(format!(
            "journal of {journal_len} bytes is shorter than its {JOURNAL_START}-byte header"
        ));
        return Ok(result);
    }

    let mut magic = [0u8; JOURNAL_MAGIC.len()];
    backend.read_at(0, &mut magic)?;
    if magic != JOURNAL_MAGIC {
        result.error = Some(format!("bad journal header {magic:02x?}"));
        return Ok(result);
    }

    let mut reader = JournalReader::new(backend);
    reader.seek_end()?;
    debug!(journal_len, "scanning journal backward");
    for record in reader.backward() {
        match record {
            Ok(record) => {
                result.valid_records += 1;
                result.payload_bytes += record.data_length();
            }
            Err(e) => {
                warn!(error = %e, valid_records = result.valid_records, "journal failed verification");
                result.error = Some(describe(&e));
                break;
            }
        }
    }

    Ok(result)
}

fn describe(error: &CoreError) -> String {
    if error.is_corruption() {
        format!("corruption: {error}")
    } else {
        error.to_string()
    }
}
