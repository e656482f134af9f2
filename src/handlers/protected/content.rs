// handlers/protected/content.rs - /api/teams/:team_id/content/:kind[/:id]
//
// One set of handlers serves all four content tables; `:kind` selects the
// table (text, image, reel or video).

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Post;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::content::{self, CreatePost, MediaLink, UpdatePost};
use crate::services::{cleanup, publishing};
use crate::types::{ContentKind, ContentStatus};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewBody {
    /// Approval note or rejection reason
    pub note: Option<String>,
}

/// GET /api/teams/:team_id/content/:kind[?status=PENDING] - newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind)): Path<(Uuid, ContentKind)>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Post>> {
    Ok(ApiResponse::success(
        content::list(&state, &user, team_id, kind, query.status).await?,
    ))
}

/// POST /api/teams/:team_id/content/:kind
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind)): Path<(Uuid, ContentKind)>,
    Json(body): Json<CreatePost>,
) -> ApiResult<Post> {
    Ok(ApiResponse::created(content::create(&state, &user, team_id, kind, body).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
) -> ApiResult<Post> {
    Ok(ApiResponse::success(content::get(&state, &user, team_id, kind, id).await?))
}

/// PATCH /api/teams/:team_id/content/:kind/:id - Partial update
///
/// A `status` field goes through the same transition rules as the
/// dedicated workflow endpoints.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
    Json(body): Json<UpdatePost>,
) -> ApiResult<Post> {
    Ok(ApiResponse::success(
        content::update(&state, &user, team_id, kind, id, body).await?,
    ))
}

/// DELETE /api/teams/:team_id/content/:kind/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
) -> ApiResult<Value> {
    let report = cleanup::delete_content(&state, &user, team_id, kind, id).await?;
    Ok(ApiResponse::deleted(json!(report)))
}

/// GET /api/teams/:team_id/content/:kind/:id/media - Download URLs
pub async fn media(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
) -> ApiResult<Vec<MediaLink>> {
    Ok(ApiResponse::success(
        content::media_links(&state, &user, team_id, kind, id).await?,
    ))
}

/// POST .../:id/submit - DRAFT to PENDING
pub async fn submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
) -> ApiResult<Post> {
    Ok(ApiResponse::success(content::submit(&state, &user, team_id, kind, id).await?))
}

/// POST .../:id/approve - PENDING to APPROVED, or SCHEDULED when a publish
/// time is set
pub async fn approve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Post> {
    let note = body.and_then(|Json(b)| b.note);
    Ok(ApiResponse::success(
        content::approve(&state, &user, team_id, kind, id, note).await?,
    ))
}

/// POST .../:id/reject - PENDING back to DRAFT with an optional reason
pub async fn reject(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
    body: Option<Json<ReviewBody>>,
) -> ApiResult<Post> {
    let reason = body.and_then(|Json(b)| b.note);
    Ok(ApiResponse::success(
        content::reject(&state, &user, team_id, kind, id, reason).await?,
    ))
}

/// POST .../:id/publish - Dispatch to every target platform
pub async fn publish(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, kind, id)): Path<(Uuid, ContentKind, Uuid)>,
) -> ApiResult<Post> {
    Ok(ApiResponse::success(
        publishing::publish(&state, &user, team_id, kind, id).await?,
    ))
}
