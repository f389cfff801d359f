//! Application state shared across handlers.

use crate::reclaim::Reclaimer;
use crate::registry::SessionRegistry;
use crate::streaming::StreamEngine;
use crate::upload::UploadPipeline;
use reel_core::config::AppConfig;
use reel_storage::MediaStore;
use std::sync::Arc;

/// Shared application state.
///
/// Every instance owns its own session registry, so independent servers can
/// coexist in one process.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Media storage backend.
    pub storage: Arc<dyn MediaStore>,
    /// Upload and stream sessions.
    pub registry: Arc<SessionRegistry>,
    /// Upload pipeline writing through `registry`.
    pub uploads: Arc<UploadPipeline>,
    /// Range streaming engine reading from `storage`.
    pub streams: Arc<StreamEngine>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: AppConfig, storage: Arc<dyn MediaStore>) -> reel_core::Result<Self> {
        config.validate()?;

        let registry = Arc::new(SessionRegistry::new());
        let server = &config.server;

        let uploads = UploadPipeline::new(
            registry.clone(),
            storage.clone(),
            server.upload_chunk_size,
            server.body_read_timeout(),
            server.media_extension.clone(),
        );
        let streams = StreamEngine::new(
            registry.clone(),
            storage.clone(),
            server.stream_chunk_size,
            server.media_extension.clone(),
        );

        Ok(Self {
            uploads: Arc::new(uploads),
            streams: Arc::new(streams),
            config: Arc::new(config),
            storage,
            registry,
        })
    }

    /// Build a reclaimer over this state's registry using the configured timings.
    pub fn reclaimer(&self) -> Reclaimer {
        Reclaimer::new(
            self.registry.clone(),
            self.config.reclaim.interval(),
            self.config.reclaim.idle_timeout(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_storage::FilesystemBackend;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn storage(temp: &tempfile::TempDir) -> Arc<dyn MediaStore> {
        Arc::new(FilesystemBackend::new(temp.path()).await.unwrap())
    }

    #[tokio::test]
    async fn new_rejects_invalid_config() {
        let temp = tempdir().unwrap();
        let mut config = AppConfig::for_testing(temp.path());
        config.server.upload_chunk_size = 0;

        assert!(matches!(
            AppState::new(config, storage(&temp).await),
            Err(reel_core::Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn reclaimer_uses_configured_timings() {
        let temp = tempdir().unwrap();
        let mut config = AppConfig::for_testing(temp.path());
        config.reclaim.idle_timeout_secs = 5;

        let state = AppState::new(config, storage(&temp).await).unwrap();
        let start = tokio::time::Instant::now();
        state
            .registry
            .streams
            .get_or_create("clip", || crate::registry::StreamSession::new("clip", start));

        let stats = state
            .reclaimer()
            .sweep(start + Duration::from_secs(6))
            .await;
        assert_eq!(stats.streams_evicted, 1);
    }

    #[tokio::test]
    async fn instances_do_not_share_sessions() {
        let temp = tempdir().unwrap();
        let a = AppState::new(AppConfig::for_testing(temp.path()), storage(&temp).await).unwrap();
        let b = AppState::new(AppConfig::for_testing(temp.path()), storage(&temp).await).unwrap();

        a.registry.streams.get_or_create("clip", || {
            crate::registry::StreamSession::new("clip", tokio::time::Instant::now())
        });
        assert!(b.registry.streams.is_empty());
    }
}
