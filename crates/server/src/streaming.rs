//! Byte-range streaming engine.

use crate::error::ApiResult;
use crate::metrics::{ACTIVE_VIEWERS, BYTES_STREAMED, record_watch};
use crate::registry::{SessionRegistry, StreamSession};
use futures::StreamExt;
use reel_core::{MediaId, ResolvedRange};
use reel_storage::{ByteStream, MediaStore};
use std::sync::Arc;
use tokio::time::Instant;

/// A resolved watch request ready to be written out.
pub struct MediaStream {
    pub range: ResolvedRange,
    /// Yields exactly the bytes of `range`, or fewer if the file ends early.
    pub body: ByteStream,
}

/// Serves slices of completed media files and tracks viewer presence.
pub struct StreamEngine {
    registry: Arc<SessionRegistry>,
    storage: Arc<dyn MediaStore>,
    chunk_size: usize,
    extension: String,
}

impl StreamEngine {
    pub fn new(
        registry: Arc<SessionRegistry>,
        storage: Arc<dyn MediaStore>,
        chunk_size: usize,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            storage,
            chunk_size: chunk_size.max(1),
            extension: extension.into(),
        }
    }

    /// Open `id` and prepare the slice named by `range_header`.
    ///
    /// Fails with `NotFound` when no file exists and with `InvalidRange` when
    /// the range starts at or past the end of the file. Either way no viewer
    /// is registered. On success the viewer stays registered until the body
    /// stream is dropped.
    pub async fn serve(&self, id: &MediaId, range_header: Option<&str>) -> ApiResult<MediaStream> {
        let key = id.storage_key(&self.extension);
        let mut reader = self.storage.open_read(&key).await?;
        let size = reader.size();

        let range = ResolvedRange::resolve(range_header, size).inspect_err(|_| {
            record_watch("invalid_range");
            tracing::debug!(id = %id, range = ?range_header, size, "Unsatisfiable range");
        })?;

        if range.start() > 0 {
            reader.seek(range.start()).await?;
        }

        let guard = self.join(id);
        record_watch(if range.is_partial() { "partial" } else { "full" });
        tracing::debug!(
            id = %id,
            start = range.start(),
            length = range.content_length(),
            size,
            "Stream started"
        );

        let mut inner = reader.into_stream(range.content_length(), self.chunk_size);
        let body = async_stream::try_stream! {
            let guard = guard;
            while let Some(chunk) = inner.next().await {
                let chunk = chunk?;
                guard.touch();
                BYTES_STREAMED.inc_by(chunk.len() as u64);
                yield chunk;
            }
        };

        Ok(MediaStream {
            range,
            body: Box::pin(body),
        })
    }

    /// Resolve `range_header` against the stored size of `id` without
    /// opening a stream or touching viewer counts.
    pub async fn head(&self, id: &MediaId, range_header: Option<&str>) -> ApiResult<ResolvedRange> {
        let key = id.storage_key(&self.extension);
        let meta = self.storage.head(&key).await?;
        Ok(ResolvedRange::resolve(range_header, meta.size)?)
    }

    /// Register a viewer on the stream session for `id`.
    fn join(&self, id: &MediaId) -> ViewerGuard {
        loop {
            let (session, created) = self
                .registry
                .streams
                .get_or_create(id.as_str(), || StreamSession::new(id.as_str(), Instant::now()));
            if created {
                tracing::debug!(id = %id, "Stream session created");
            }
            // A session evicted between lookup and join is gone from the registry
            if session.join(Instant::now()) {
                ACTIVE_VIEWERS.inc();
                return ViewerGuard { session };
            }
        }
    }
}

/// Holds one viewer slot on a stream session for as long as it lives.
pub struct ViewerGuard {
    session: Arc<StreamSession>,
}

impl ViewerGuard {
    fn touch(&self) {
        self.session.touch(Instant::now());
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.session.leave(Instant::now());
        ACTIVE_VIEWERS.dec();
        tracing::debug!(id = %self.session.id(), "Stream finished");
    }
}
