// handlers/protected/uploads.rs - POST /api/teams/:team_id/uploads

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::content::{self, UploadSlot};
use crate::types::ContentKind;

#[derive(Debug, Deserialize)]
pub struct UploadBody {
    pub kind: ContentKind,
    pub filename: String,
    pub content_type: String,
}

/// POST /api/teams/:team_id/uploads - Reserve a key and a presigned PUT URL
///
/// The client uploads directly to object storage, then references the
/// returned key in `media_keys` or `thumbnail_key`.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<UploadBody>,
) -> ApiResult<UploadSlot> {
    let slot = content::create_upload(&state, &user, team_id, body.kind, &body.filename, &body.content_type).await?;
    Ok(ApiResponse::created(slot))
}
