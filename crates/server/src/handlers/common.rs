//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use reel_core::MediaId;
use serde::Deserialize;

/// Header carrying the announced total size of an upload.
pub const UPLOAD_LENGTH_HEADER: &str = "x-upload-length";

/// Query string naming a media file.
#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub id: Option<String>,
}

/// Parse the `id` query parameter.
pub fn require_media_id(id: Option<&str>) -> ApiResult<MediaId> {
    let id = id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("missing id parameter".to_string()))?;
    MediaId::parse(id).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

/// Resolve the announced total size of an upload.
///
/// Sources in order: `X-Upload-Length` header, `size` query parameter,
/// `Content-Length` header. The first one present must hold a positive
/// integer no larger than `max`.
pub fn declared_size(
    headers: &HeaderMap,
    query_size: Option<&str>,
    max: Option<u64>,
) -> ApiResult<u64> {
    let header_value = move |name: &'static str| {
        headers.get(name).map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::InvalidRequest(format!("{name} is not valid text")))
        })
    };

    let (source, raw) = if let Some(value) = header_value(UPLOAD_LENGTH_HEADER) {
        (UPLOAD_LENGTH_HEADER, value?)
    } else if let Some(value) = query_size {
        ("size", value)
    } else if let Some(value) = header_value("content-length") {
        ("content-length", value?)
    } else {
        return Err(ApiError::InvalidRequest(
            "missing declared upload size".to_string(),
        ));
    };

    let size: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("invalid {source}: {raw:?}")))?;

    if size == 0 {
        return Err(ApiError::InvalidRequest(format!(
            "{source} must be greater than 0"
        )));
    }

    if let Some(max) = max
        && size > max
    {
        return Err(ApiError::InvalidRequest(format!(
            "declared size {size} exceeds maximum of {max} bytes"
        )));
    }

    Ok(size)
}
