//! File-based storage backend on top of `tokio::fs`.

use crate::backend::AsyncStorageBackend;
use crate::error::{StorageError, StorageResult};
use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

/// A read-only, non-blocking journal file.
///
/// The file handle carries a single OS cursor, so each positional read holds
/// an async mutex across its seek and read. The size is sampled when the
/// backend is opened and refreshed by [`AsyncFileBackend::refresh_size`].
#[derive(Debug)]
pub struct AsyncFileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: parking_lot::RwLock<u64>,
}

impl AsyncFileBackend {
    /// Opens an existing journal file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub async fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path).await?;
        let size = file.metadata().await?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: parking_lot::RwLock::new(size),
        })
    }

    /// Re-reads the file length from the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub async fn refresh_size(&self) -> StorageResult<u64> {
        let size = self.file.lock().await.metadata().await?.len();
        *self.size.write() = size;
        Ok(size)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsyncStorageBackend for AsyncFileBackend {
    fn read_at<'a>(
        &'a self,
        offset: u64,
        buf: &'a mut [u8],
    ) -> impl Future<Output = StorageResult<()>> + Send + 'a {
        async move {
            let size = *self.size.read();
            StorageError::check_range(offset, buf.len(), size)?;

            if buf.is_empty() {
                return Ok(());
            }

            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(buf).await?;
            Ok(())
        }
    }

    fn size(&self) -> impl Future<Output = StorageResult<u64>> + Send + '_ {
        async move { Ok(*self.size.read()) }
    }
}
