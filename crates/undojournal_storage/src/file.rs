//! File-based storage backend with blocking I/O.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A journal file accessed with blocking positional reads and appends.
///
/// The size is cached at open and advanced by each append, so reads are
/// bounds-checked without a `metadata` call. Another process growing the
/// file is not observed.
///
/// `flush()` calls `File::flush()` and then `File::sync_data()`, so an
/// appended undo record is on disk before the target is mutated. A lock
/// keeps each seek/read pair atomic.
///
/// ```no_run
/// use undojournal_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let journal = FileBackend::open_read_only(Path::new("target.journal")).unwrap();
/// let mut header = [0u8; 8];
/// journal.read_at(0, &mut header).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens a journal for appending, creating an empty file if needed.
    ///
    /// Existing contents are kept; appends go after them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path, file)
    }

    /// Opens an existing journal for reading only.
    ///
    /// Appends on a read-only backend fail with an I/O error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file)
    }

    fn from_file(path: &Path, file: File) -> StorageResult<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let size = *self.size.read();
        StorageError::check_range(offset, buf.len(), size)?;

        if buf.is_empty() {
            return Ok(());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;

        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }
}
