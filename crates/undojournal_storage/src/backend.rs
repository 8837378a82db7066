//! Storage backend trait definitions.

use crate::error::StorageResult;
use std::future::Future;

/// A blocking storage backend for journal bytes.
///
/// Storage backends are **opaque byte stores**. They provide positional
/// reads, appends and flushing. The journal crates own all format
/// interpretation - backends do not understand records or trailers.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` fills the whole buffer with bytes previously written at
///   that offset, or fails without a partial result
/// - `flush` ensures all appended data is durable
/// - Backends must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads exactly `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The offset is beyond the current size
    /// - The read would extend beyond the current size
    /// - An I/O error occurs
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;
}

/// A non-blocking, read-only view of journal bytes.
///
/// Every read is a suspension point. Dropping a returned future cancels the
/// read; the backend itself holds no cursor, so a cancelled read leaves no
/// state behind.
pub trait AsyncStorageBackend: Send + Sync {
    /// Reads exactly `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`StorageBackend::read_at`].
    fn read_at<'a>(
        &'a self,
        offset: u64,
        buf: &'a mut [u8],
    ) -> impl Future<Output = StorageResult<()>> + Send + 'a;

    /// Returns the current size of the storage in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> impl Future<Output = StorageResult<u64>> + Send + '_;
}
