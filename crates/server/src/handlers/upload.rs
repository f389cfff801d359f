//! Upload endpoints.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{MediaQuery, declared_size, require_media_id};
use crate::state::AppState;
use crate::upload::AppendOutcome;
use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use reel_core::MediaId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Query string for an upload request.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub id: Option<String>,
    /// Announced total size, used when no `X-Upload-Length` header is sent.
    pub size: Option<String>,
}

/// Progress after one upload request.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: MediaId,
    pub written_size: u64,
    pub declared_size: u64,
    pub complete: bool,
}

impl From<AppendOutcome> for UploadResponse {
    fn from(outcome: AppendOutcome) -> Self {
        Self {
            id: outcome.id,
            written_size: outcome.written_size,
            declared_size: outcome.declared_size,
            complete: outcome.complete,
        }
    }
}

/// State of an in-flight upload.
#[derive(Debug, Serialize)]
pub struct UploadStatusResponse {
    pub id: MediaId,
    pub written_size: u64,
    pub declared_size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub idle_secs: u64,
}

/// POST /api/upload?id=<id> - Append the request body to an upload.
///
/// The body may be any part of the file; repeated calls with the same id
/// append in call order until the declared size is reached.
pub async fn upload_media(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<UploadResponse>> {
    let id = require_media_id(query.id.as_deref())?;
    let declared = declared_size(
        &headers,
        query.size.as_deref(),
        state.config.server.max_upload_size(),
    )?;

    let outcome = state
        .uploads
        .append_chunk(&id, declared, body.into_data_stream())
        .await?;

    Ok(Json(outcome.into()))
}

/// GET /api/upload/status?id=<id> - Report progress of an in-flight upload.
pub async fn upload_status(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> ApiResult<Json<UploadStatusResponse>> {
    let id = require_media_id(query.id.as_deref())?;
    let session = state
        .registry
        .uploads
        .get(id.as_str())
        .ok_or_else(|| ApiError::NotFound(format!("no upload in progress for {id}")))?;

    let progress = session.progress();
    Ok(Json(UploadStatusResponse {
        id,
        written_size: progress.written,
        declared_size: session.declared_size(),
        started_at: session.started_at(),
        idle_secs: progress.last_activity.elapsed().as_secs(),
    }))
}
