//! Media storage abstraction and backends for reel.
//!
//! This crate provides:
//! - Append-only media writes that never truncate existing bytes
//! - Independent, seekable reads streamed in bounded chunks
//! - Backends: local filesystem

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{AppendHandle, ByteStream, MediaStore, ObjectMeta, ReadHandle};

use reel_core::config::StorageConfig;
use std::sync::Arc;

/// Create a media store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn MediaStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
