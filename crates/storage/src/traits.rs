//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Media store abstraction: append-only writes, seekable reads.
///
/// A stored object is written through exactly one [`AppendHandle`] at a time
/// and becomes immutable once that handle is closed. Readers open their own
/// [`ReadHandle`] per request and never share it.
#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's size without opening it for reading.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Open an object for appending, creating it if missing.
    ///
    /// Re-opening an existing object never truncates it: new bytes land
    /// after the bytes already stored.
    async fn open_append(&self, key: &str) -> StorageResult<Box<dyn AppendHandle>>;

    /// Open an object for reading.
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) if
    /// the object does not exist.
    async fn open_read(&self, key: &str) -> StorageResult<Box<dyn ReadHandle>>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "filesystem").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
}

/// Exclusive write handle to an object opened in append mode.
#[async_trait]
pub trait AppendHandle: Send {
    /// Append all of `data` to the object.
    ///
    /// Returns only once the bytes have reached the object, so a write
    /// failure is reported by the call that caused it.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Flush and close the handle, returning the bytes written through it.
    async fn close(self: Box<Self>) -> StorageResult<u64>;
}

/// Read handle to an object, independent of every other reader.
#[async_trait]
pub trait ReadHandle: Send {
    /// Size of the object at the time it was opened.
    fn size(&self) -> u64;

    /// Position the handle so the next read starts at `offset`.
    async fn seek(&mut self, offset: u64) -> StorageResult<()>;

    /// Consume the handle, yielding up to `len` bytes from the current
    /// position in reads of at most `chunk_size` bytes.
    ///
    /// The stream ends early, without an error, if the object ends first.
    fn into_stream(self: Box<Self>, len: u64, chunk_size: usize) -> ByteStream;
}
