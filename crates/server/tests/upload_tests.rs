//! Integration tests for the upload endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use common::{TestServer, test_media};
use std::time::Duration;
use tower::ServiceExt;

#[tokio::test]
async fn test_single_request_upload_completes() {
    let server = TestServer::new().await;
    let data = test_media(1000);

    let response = server.upload("movie", 1000, data.clone()).await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["id"], "movie");
    assert_eq!(json["written_size"], 1000);
    assert_eq!(json["complete"], true);

    assert_eq!(std::fs::read(server.media_path("movie")).unwrap(), data);
    assert!(!server.state.registry.uploads.contains("movie"));
}

#[tokio::test]
async fn test_multi_request_upload_appends_in_order() {
    let server = TestServer::new().await;
    let data = test_media(1000);

    for (i, part) in data.chunks(300).enumerate() {
        let response = server.upload("parts", 1000, part.to_vec()).await;
        assert_eq!(response.status, StatusCode::OK);

        let done = (i + 1) * 300 >= 1000;
        assert_eq!(response.json()["complete"], done);
        assert_eq!(server.state.registry.uploads.contains("parts"), !done);
    }

    assert_eq!(std::fs::read(server.media_path("parts")).unwrap(), data);
}

#[tokio::test]
async fn test_upload_status_reports_progress() {
    let server = TestServer::new().await;
    server.upload("progress", 100, vec![1u8; 40]).await;

    let response = server
        .send(
            Request::get("/api/upload/status?id=progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["written_size"], 40);
    assert_eq!(json["declared_size"], 100);
    assert!(json["started_at"].is_string());

    server.upload("progress", 100, vec![2u8; 60]).await;
    let response = server
        .send(
            Request::get("/api/upload/status?id=progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_declared_size_from_query_parameter() {
    let server = TestServer::new().await;

    let response = server
        .send(
            Request::post("/api/upload?id=query&size=5")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["declared_size"], 5);
    assert_eq!(response.json()["complete"], true);
}

#[tokio::test]
async fn test_invalid_requests_rejected_before_io() {
    let server = TestServer::new().await;

    let cases = [
        ("/api/upload", Some("10")),
        ("/api/upload?id=", Some("10")),
        ("/api/upload?id=../escape", Some("10")),
        ("/api/upload?id=zero", Some("0")),
        ("/api/upload?id=negative", Some("-1")),
        ("/api/upload?id=garbage", Some("lots")),
    ];

    for (uri, length) in cases {
        let mut builder = Request::post(uri);
        if let Some(length) = length {
            builder = builder.header("X-Upload-Length", length);
        }
        let response = server.send(builder.body(Body::from("data")).unwrap()).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(response.json()["code"], "invalid_request", "{uri}");
    }

    assert!(server.state.registry.uploads.is_empty());
    assert_eq!(std::fs::read_dir(&server.media_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_declared_size_above_maximum_rejected() {
    let server = TestServer::with_config(|config| config.server.max_upload_size = 100).await;

    let response = server.upload("huge", 101, vec![0u8; 10]).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = server.upload("fits", 100, vec![0u8; 100]).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_non_post_upload_rejected() {
    let server = TestServer::new().await;

    let response = server
        .send(Request::put("/api/upload?id=movie").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_concurrent_uploads_for_distinct_ids() {
    let server = TestServer::new().await;
    let left = test_media(5000);
    let right: Vec<u8> = test_media(5000).into_iter().rev().collect();

    // `left` stalls mid-body while holding its session lock
    let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, std::io::Error>>();
    tx.unbounded_send(Ok(Bytes::copy_from_slice(&left[..1000])))
        .unwrap();
    let request = Request::post("/api/upload?id=left")
        .header("X-Upload-Length", "5000")
        .body(Body::from_stream(rx))
        .unwrap();
    let router = server.router.clone();
    let left_task = tokio::spawn(async move { router.oneshot(request).await.unwrap().status() });

    let left_session = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(session) = server.state.registry.uploads.get("left")
                && session.progress().written == 1000
            {
                break session;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("left upload never started");

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        server.upload("right", 5000, right.clone()),
    )
    .await
    .expect("upload for another id was blocked");
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["complete"], true);
    assert_eq!(std::fs::read(server.media_path("right")).unwrap(), right);

    assert!(!left_task.is_finished());
    assert_eq!(left_session.progress().written, 1000);

    tx.unbounded_send(Ok(Bytes::copy_from_slice(&left[1000..])))
        .unwrap();
    drop(tx);
    assert_eq!(left_task.await.unwrap(), StatusCode::OK);
    assert_eq!(std::fs::read(server.media_path("left")).unwrap(), left);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_for_same_id_are_serialized() {
    let server = TestServer::new().await;
    let parts: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 500]).collect();

    let mut tasks = Vec::new();
    for part in parts.clone() {
        let router = server.router.clone();
        tasks.push(tokio::spawn(async move {
            let request = Request::post("/api/upload?id=shared")
                .header("X-Upload-Length", "4000")
                .body(Body::from(part))
                .unwrap();
            router.oneshot(request).await.unwrap().status()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let stored = std::fs::read(server.media_path("shared")).unwrap();
    assert_eq!(stored.len(), 4000);

    // Each request's bytes land contiguously, in some order
    let mut seen: Vec<u8> = stored
        .chunks(500)
        .map(|block| {
            assert!(block.iter().all(|b| *b == block[0]), "interleaved write");
            block[0]
        })
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..8u8).collect::<Vec<_>>());
    assert!(!server.state.registry.uploads.contains("shared"));
}
