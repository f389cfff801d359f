//! Server test utilities.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use reel_core::config::AppConfig;
use reel_server::{AppState, create_router};
use reel_storage::{FilesystemBackend, MediaStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub media_dir: PathBuf,
    _temp_dir: TempDir,
}

/// A fully buffered response.
#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, |backend| Arc::new(backend) as Arc<dyn MediaStore>).await
    }

    /// Create a test server whose filesystem storage is wrapped by `wrap`.
    pub async fn with_storage<W>(wrap: W) -> Self
    where
        W: FnOnce(FilesystemBackend) -> Arc<dyn MediaStore>,
    {
        Self::build(|_| {}, wrap).await
    }

    async fn build<F, W>(modifier: F, wrap: W) -> Self
    where
        F: FnOnce(&mut AppConfig),
        W: FnOnce(FilesystemBackend) -> Arc<dyn MediaStore>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let media_dir = temp_dir.path().join("videos");

        let storage = wrap(
            FilesystemBackend::new(&media_dir)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig::for_testing(&media_dir);
        modifier(&mut config);

        let state = AppState::new(config, storage).expect("Invalid test configuration");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            media_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Write a finished media file directly into storage.
    pub fn put_media(&self, id: &str, data: &[u8]) {
        std::fs::write(self.media_path(id), data).expect("Failed to write media file");
    }

    pub fn media_path(&self, id: &str) -> PathBuf {
        self.media_dir.join(format!("{id}.mp4"))
    }

    /// Send a request and buffer the whole response.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// POST one upload request announcing `declared` total bytes.
    pub async fn upload(&self, id: &str, declared: u64, data: impl Into<Bytes>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/upload?id={id}"))
            .header("X-Upload-Length", declared.to_string())
            .body(Body::from(data.into()))
            .unwrap();
        self.send(request).await
    }

    /// GET /api/watch with an optional `Range` header.
    pub async fn watch(&self, id: &str, range: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("GET")
            .uri(format!("/api/watch?id={id}"));
        if let Some(range) = range {
            builder = builder.header("Range", range);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

/// Deterministic test payload.
#[allow(dead_code)]
pub fn test_media(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
