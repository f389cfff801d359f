//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum number of bytes appended to storage per write.
    #[serde(default = "default_upload_chunk_size")]
    pub upload_chunk_size: usize,
    /// Maximum number of bytes read from storage per streamed chunk.
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: usize,
    /// Time allowed for each read of an upload body before the call fails.
    #[serde(default = "default_body_read_timeout_secs")]
    pub body_read_timeout_secs: u64,
    /// Largest accepted declared upload size in bytes (0 = unlimited).
    #[serde(default)]
    pub max_upload_size: u64,
    /// File extension of stored media (without the dot).
    #[serde(default = "default_media_extension")]
    pub media_extension: String,
    /// Content type announced when streaming media.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_upload_chunk_size() -> usize {
    crate::DEFAULT_UPLOAD_CHUNK_SIZE
}

fn default_stream_chunk_size() -> usize {
    crate::DEFAULT_STREAM_CHUNK_SIZE
}

fn default_body_read_timeout_secs() -> u64 {
    30
}

fn default_media_extension() -> String {
    "mp4".to_string()
}

fn default_content_type() -> String {
    "video/mp4".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_chunk_size: default_upload_chunk_size(),
            stream_chunk_size: default_stream_chunk_size(),
            body_read_timeout_secs: default_body_read_timeout_secs(),
            max_upload_size: 0,
            media_extension: default_media_extension(),
            content_type: default_content_type(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Get the body read timeout as a Duration.
    pub fn body_read_timeout(&self) -> Duration {
        Duration::from_secs(self.body_read_timeout_secs)
    }

    /// Upper bound on declared upload sizes, if one is configured.
    pub fn max_upload_size(&self) -> Option<u64> {
        (self.max_upload_size > 0).then_some(self.max_upload_size)
    }

    /// Validate server configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.upload_chunk_size == 0 {
            return Err("server.upload_chunk_size must be greater than 0".to_string());
        }

        if self.stream_chunk_size == 0 {
            return Err("server.stream_chunk_size must be greater than 0".to_string());
        }

        if self.body_read_timeout_secs == 0 {
            return Err("server.body_read_timeout_secs must be greater than 0".to_string());
        }

        let extension = self.media_extension.as_str();
        if extension.is_empty()
            || !extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(format!(
                "server.media_extension must be a non-empty alphanumeric string, got {extension:?}"
            ));
        }

        if self.content_type.is_empty() {
            return Err("server.content_type cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for stored media files.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./videos"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty path".to_string())
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Idle session reclamation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReclaimConfig {
    /// Interval in seconds between reclamation sweeps (default: 15 minutes).
    #[serde(default = "default_reclaim_interval_secs")]
    pub interval_secs: u64,
    /// Idle time in seconds after which a session may be reclaimed (default: 1 hour).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_reclaim_interval_secs() -> u64 {
    900
}

fn default_idle_timeout_secs() -> u64 {
    3600
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reclaim_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl ReclaimConfig {
    /// Get the sweep interval as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Get the idle timeout as a Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Validate reclamation configuration.
    pub fn validate(&self) -> Result<(), String> {
        // tokio::time::interval panics on a zero period
        if self.interval_secs == 0 {
            return Err("reclaim.interval_secs cannot be 0".to_string());
        }

        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Session reclamation configuration.
    #[serde(default)]
    pub reclaim: ReclaimConfig,
}

impl AppConfig {
    /// Create a test configuration storing media under `path`.
    ///
    /// **For testing only.** Uses small chunk sizes so multi-chunk paths are
    /// exercised with small payloads.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig {
                upload_chunk_size: 64,
                stream_chunk_size: 64,
                ..Default::default()
            },
            storage: StorageConfig::Filesystem { path: path.into() },
            reclaim: ReclaimConfig::default(),
        }
    }

    /// Validate every configuration section.
    pub fn validate(&self) -> crate::Result<()> {
        self.server.validate().map_err(crate::Error::Config)?;
        self.storage.validate().map_err(crate::Error::Config)?;
        self.reclaim.validate().map_err(crate::Error::Config)?;
        Ok(())
    }
}
