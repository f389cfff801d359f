//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{AppendHandle, ByteStream, MediaStore, ObjectMeta, ReadHandle};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;

/// Local filesystem media store.
///
/// Every key maps to one file directly under the root directory.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full path for a key, with path traversal protection.
    ///
    /// Runs the blocking `canonicalize`/`symlink_metadata` calls on the
    /// blocking pool.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Synchronous key validation.
    ///
    /// Keys must be a single plain file name. An existing entry that is a
    /// symlink resolving outside the root is rejected.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == key => {}
            _ => {
                return Err(StorageError::InvalidKey(format!(
                    "key must be a plain file name: {key}"
                )));
            }
        }

        let path = root.join(key);

        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let root_canonical = root.canonicalize()?;
                let canonical = path.canonicalize().map_err(|_| {
                    StorageError::InvalidKey(format!("symlink target missing or invalid: {key}"))
                })?;
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {key}"
                    )));
                }
                Ok(path)
            }
            Ok(_) => Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path),
            Err(err) => Err(StorageError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to stat path: {err}"),
            ))),
        }
    }
}

/// Map a NotFound I/O error onto [`StorageError::NotFound`] for `key`.
fn not_found_or_io(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[async_trait]
impl MediaStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.key_path(key).await?;
        let metadata = fs::metadata(&path).await.map_err(not_found_or_io(key))?;
        Ok(ObjectMeta {
            size: metadata.len(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn open_append(&self, key: &str) -> StorageResult<Box<dyn AppendHandle>> {
        let path = self.key_path(key).await?;
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Box::new(FilesystemAppend {
            file,
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn open_read(&self, key: &str) -> StorageResult<Box<dyn ReadHandle>> {
        let path = self.key_path(key).await?;
        let file = fs::File::open(&path).await.map_err(not_found_or_io(key))?;
        // Stat the open handle so the size matches the bytes this reader sees
        let size = file.metadata().await?.len();

        Ok(Box::new(FilesystemRead { file, size }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key).await?;
        fs::remove_file(&path).await.map_err(not_found_or_io(key))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {}", e),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

/// Append handle for the filesystem backend.
struct FilesystemAppend {
    file: fs::File,
    bytes_written: u64,
}

#[async_trait]
impl AppendHandle for FilesystemAppend {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        // tokio hands writes to a blocking task; flush so failures surface here
        self.file.write_all(&data).await?;
        self.file.flush().await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn close(self: Box<Self>) -> StorageResult<u64> {
        let mut this = *self;
        this.file.flush().await?;
        this.file.sync_all().await?;
        Ok(this.bytes_written)
    }
}

/// Read handle for the filesystem backend.
struct FilesystemRead {
    file: fs::File,
    size: u64,
}

#[async_trait]
impl ReadHandle for FilesystemRead {
    fn size(&self) -> u64 {
        self.size
    }

    async fn seek(&mut self, offset: u64) -> StorageResult<()> {
        self.file.seek(std::io::SeekFrom::Start(offset)).await?;
        Ok(())
    }

    fn into_stream(self: Box<Self>, len: u64, chunk_size: usize) -> ByteStream {
        let mut file = self.file;
        let stream = async_stream::try_stream! {
            let mut remaining = len;
            let buf_len = usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size));
            let mut buf = vec![0u8; buf_len];
            while remaining > 0 {
                let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
                let n = file.read(&mut buf[..want]).await?;
                if n == 0 {
                    break;
                }
                remaining -= n as u64;
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Box::pin(stream)
    }
}
