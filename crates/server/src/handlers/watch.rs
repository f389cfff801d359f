//! Watch endpoints.

use crate::error::ApiResult;
use crate::handlers::common::{MediaQuery, require_media_id};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reel_core::ResolvedRange;

/// GET /api/watch?id=<id> - Stream a media file, honouring a `Range` header.
pub async fn watch_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = require_media_id(query.id.as_deref())?;
    let stream = state.streams.serve(&id, range_header(&headers)).await?;

    let (status, response_headers) = media_headers(&stream.range, &state.config.server.content_type);
    Ok((status, response_headers, Body::from_stream(stream.body)).into_response())
}

/// HEAD /api/watch?id=<id> - Same headers as GET, no body, no viewer.
pub async fn head_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = require_media_id(query.id.as_deref())?;
    let range = state.streams.head(&id, range_header(&headers)).await?;

    let (status, response_headers) = media_headers(&range, &state.config.server.content_type);
    Ok((status, response_headers, Body::empty()).into_response())
}

/// A `Range` header that is not valid text is treated like an unparsable one.
fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(RANGE).and_then(|value| value.to_str().ok())
}

fn media_headers(range: &ResolvedRange, content_type: &str) -> (StatusCode, HeaderMap) {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(range.content_length()));

    match range.content_range() {
        Some(content_range) => {
            if let Ok(value) = HeaderValue::from_str(&content_range) {
                headers.insert(CONTENT_RANGE, value);
            }
            (StatusCode::PARTIAL_CONTENT, headers)
        }
        None => (StatusCode::OK, headers),
    }
}
