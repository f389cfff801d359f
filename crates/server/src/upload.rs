//! Chunked upload pipeline.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    ACTIVE_UPLOAD_SESSIONS, BYTES_UPLOADED, CHUNK_APPEND_DURATION, UPLOAD_SESSIONS_COMPLETED,
    UPLOAD_SESSIONS_CREATED, record_upload_error,
};
use crate::registry::{SessionRegistry, UploadIo, UploadSession};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reel_core::MediaId;
use reel_storage::MediaStore;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Result of one append call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendOutcome {
    pub id: MediaId,
    pub written_size: u64,
    pub declared_size: u64,
    pub complete: bool,
}

/// Appends request bodies to their destination files through upload sessions.
pub struct UploadPipeline {
    registry: Arc<SessionRegistry>,
    storage: Arc<dyn MediaStore>,
    chunk_size: usize,
    body_timeout: Duration,
    extension: String,
}

impl UploadPipeline {
    pub fn new(
        registry: Arc<SessionRegistry>,
        storage: Arc<dyn MediaStore>,
        chunk_size: usize,
        body_timeout: Duration,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            storage,
            chunk_size: chunk_size.max(1),
            body_timeout,
            extension: extension.into(),
        }
    }

    /// Append one request body to the upload for `id`.
    ///
    /// The first call for an id fixes the declared size. Calls for the same id
    /// are serialized; calls for different ids run in parallel. Once the
    /// written size reaches the declared size the file is closed and the
    /// session leaves the registry.
    ///
    /// Storage, body read, and body timeout failures leave the session in
    /// place so a later call can resume.
    pub async fn append_chunk<S, E>(
        &self,
        id: &MediaId,
        declared_size: u64,
        body: S,
    ) -> ApiResult<AppendOutcome>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display + Send,
    {
        if declared_size == 0 {
            return Err(ApiError::InvalidRequest(
                "declared size must be greater than 0".to_string(),
            ));
        }

        let started = Instant::now();
        let mut body = std::pin::pin!(body);

        loop {
            let (session, created) = self.registry.uploads.get_or_create(id.as_str(), || {
                UploadSession::new(
                    id.clone(),
                    id.storage_key(&self.extension),
                    declared_size,
                    Instant::now(),
                )
            });

            if created {
                UPLOAD_SESSIONS_CREATED.inc();
                ACTIVE_UPLOAD_SESSIONS.inc();
                tracing::info!(id = %id, declared_size, "Upload session created");
            }

            let mut io = session.io.lock().await;
            if io.retired {
                // Completed or evicted while we waited; start over with a fresh lookup
                tracing::debug!(id = %id, "Upload session retired while waiting, retrying");
                continue;
            }

            let result = self.append_locked(&session, &mut io, &mut body).await;
            CHUNK_APPEND_DURATION.observe(started.elapsed().as_secs_f64());
            return result;
        }
    }

    async fn append_locked<S, E>(
        &self,
        session: &Arc<UploadSession>,
        io: &mut UploadIo,
        body: &mut std::pin::Pin<&mut S>,
    ) -> ApiResult<AppendOutcome>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display + Send,
    {
        let id = session.id();

        let handle = match io.handle.take() {
            Some(handle) => handle,
            None => self.storage.open_append(session.key()).await.map_err(|e| {
                record_upload_error("open_failed");
                tracing::warn!(id = %id, error = %e, "Failed to open upload destination");
                e
            })?,
        };
        let handle = io.handle.insert(handle);

        loop {
            let frame = match tokio::time::timeout(self.body_timeout, body.next()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(e))) => {
                    record_upload_error("body_read");
                    tracing::warn!(id = %id, error = %e, "Upload body read failed");
                    return Err(ApiError::BodyRead(e.to_string()));
                }
                Ok(None) => break,
                Err(_) => {
                    record_upload_error("body_timeout");
                    tracing::warn!(
                        id = %id,
                        timeout_secs = self.body_timeout.as_secs(),
                        "Upload body stalled"
                    );
                    return Err(ApiError::BodyTimeout {
                        secs: self.body_timeout.as_secs(),
                    });
                }
            };

            let mut frame = frame;
            while !frame.is_empty() {
                let piece = frame.split_to(frame.len().min(self.chunk_size));
                let len = piece.len() as u64;
                handle.write(piece).await.map_err(|e| {
                    record_upload_error("write_failed");
                    tracing::error!(id = %id, error = %e, "Failed to append upload chunk");
                    e
                })?;
                let written = session.record_write(len, Instant::now());
                BYTES_UPLOADED.inc_by(len);
                tracing::debug!(id = %id, bytes = len, written, "Chunk appended");
            }
        }

        session.touch(Instant::now());
        let written_size = session.progress().written;
        let declared_size = session.declared_size();
        let complete = written_size >= declared_size;

        if complete {
            io.retired = true;
            self.registry.uploads.remove_if_same(id.as_str(), session);
            ACTIVE_UPLOAD_SESSIONS.dec();

            if let Some(handle) = io.handle.take() {
                handle.close().await.map_err(|e| {
                    record_upload_error("close_failed");
                    tracing::error!(id = %id, error = %e, "Failed to finalize upload");
                    e
                })?;
            }

            UPLOAD_SESSIONS_COMPLETED.inc();
            tracing::info!(id = %id, written_size, declared_size, "Upload completed");
        }

        Ok(AppendOutcome {
            id: id.clone(),
            written_size,
            declared_size,
            complete,
        })
    }
}
