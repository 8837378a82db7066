//! In-memory storage backend for testing.

use crate::backend::{AsyncStorageBackend, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::future::Future;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral journals that don't need persistence
///
/// It implements both [`StorageBackend`] and [`AsyncStorageBackend`]; the
/// async reads complete without suspending.
///
/// # Example
///
/// ```rust
/// use undojournal_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(StorageBackend::size(&backend).unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing torn or corrupted journals.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    fn copy_out(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let data = self.data.read();
        StorageError::check_range(offset, buf.len(), data.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        self.copy_out(offset, buf)
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        // Nothing is buffered
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }
}

impl AsyncStorageBackend for InMemoryBackend {
    fn read_at<'a>(
        &'a self,
        offset: u64,
        buf: &'a mut [u8],
    ) -> impl Future<Output = StorageResult<()>> + Send + 'a {
        async move { self.copy_out(offset, buf) }
    }

    fn size(&self) -> impl Future<Output = StorageResult<u64>> + Send + '_ {
        async move { Ok(self.data.read().len() as u64) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(StorageBackend::size(&backend).unwrap(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn memory_append_returns_correct_offset() {
        let mut backend = InMemoryBackend::new();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(StorageBackend::size(&backend).unwrap(), 11);
    }

    #[test]
    fn memory_read_at_returns_correct_data() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        let mut buf = [0u8; 5];
        StorageBackend::read_at(&backend, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        StorageBackend::read_at(&backend, 6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn memory_read_at_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());

        let mut buf = [0u8; 5];
        let result = StorageBackend::read_at(&backend, 10, &mut buf);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_read_at_extending_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());

        let mut buf = [0u8; 10];
        let result = StorageBackend::read_at(&backend, 3, &mut buf);
        assert!(matches!(
            result,
            Err(StorageError::ReadPastEnd {
                offset: 3,
                len: 10,
                size: 5
            })
        ));
    }

    #[test]
    fn memory_empty_read_at_end() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        let mut buf = [0u8; 0];
        assert!(StorageBackend::read_at(&backend, 5, &mut buf).is_ok());
    }

    #[test]
    fn memory_flush_succeeds() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"data").unwrap();
        assert!(backend.flush().is_ok());
    }

    #[tokio::test]
    async fn memory_async_read_matches_sync() {
        let backend = InMemoryBackend::with_data(b"journal bytes".to_vec());

        let mut sync_buf = [0u8; 5];
        StorageBackend::read_at(&backend, 8, &mut sync_buf).unwrap();

        let mut async_buf = [0u8; 5];
        AsyncStorageBackend::read_at(&backend, 8, &mut async_buf)
            .await
            .unwrap();

        assert_eq!(sync_buf, async_buf);
        assert_eq!(AsyncStorageBackend::size(&backend).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn memory_async_read_past_end_fails() {
        let backend = InMemoryBackend::with_data(vec![0; 4]);
        let mut buf = [0u8; 8];
        let result = AsyncStorageBackend::read_at(&backend, 0, &mut buf).await;
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    proptest::proptest! {
        #[test]
        fn memory_reads_see_every_append(
            chunks in proptest::collection::vec(proptest::collection::vec(proptest::num::u8::ANY, 0..64), 1..16)
        ) {
            let mut backend = InMemoryBackend::new();
            let mut offsets = Vec::new();
            for chunk in &chunks {
                offsets.push(backend.append(chunk).unwrap());
            }

            for (chunk, &offset) in chunks.iter().zip(&offsets) {
                let mut buf = vec![0u8; chunk.len()];
                StorageBackend::read_at(&backend, offset, &mut buf).unwrap();
                proptest::prop_assert_eq!(&buf, chunk);
            }
            proptest::prop_assert_eq!(backend.data(), chunks.concat());
        }
    }
}
