//! # UndoJournal Storage
//!
//! Storage backend traits and implementations for UndoJournal.
//!
//! This crate provides the lowest-level storage abstraction for the journal.
//! Storage backends are **opaque byte stores** - they do not interpret
//! the data they store.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (positional read, append, flush)
//! - No knowledge of journal headers, records or trailers
//! - Must be `Send + Sync` so a handle can move between threads and tasks
//! - The journal crates own all format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral journals (sync and async)
//! - [`FileBackend`] - Blocking file access through OS file APIs
//! - [`AsyncFileBackend`] - Non-blocking file access through `tokio::fs`
//!
//! ## Example
//!
//! ```rust
//! use undojournal_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let mut buf = [0u8; 5];
//! backend.read_at(offset + 6, &mut buf).unwrap();
//! assert_eq!(&buf, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod async_file;
mod backend;
mod error;
mod file;
mod memory;

pub use async_file::AsyncFileBackend;
pub use backend::{AsyncStorageBackend, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
