// handlers/protected/invites.rs - team invitations

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Invite, Member};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::teams::{self, CreatedInvite, InvitePreview};
use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct InviteBody {
    pub email: String,
    pub role: Role,
}

/// GET /api/teams/:team_id/invites
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<Invite>> {
    Ok(ApiResponse::success(teams::list_invites(&state, &user, team_id).await?))
}

/// POST /api/teams/:team_id/invites - Invite by email
///
/// Returns 409 when the address already belongs to a member or has a
/// pending invitation for this team.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<InviteBody>,
) -> ApiResult<CreatedInvite> {
    let invite = teams::create_invite(&state, &user, team_id, &body.email, body.role).await?;
    Ok(ApiResponse::created(invite))
}

/// DELETE /api/teams/:team_id/invites/:invite_id - Cancel a pending invite
pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, invite_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Invite> {
    Ok(ApiResponse::success(teams::cancel_invite(&state, &user, team_id, invite_id).await?))
}

/// GET /api/invites/:token - Invitation addressed to the caller
pub async fn preview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(token): Path<String>,
) -> ApiResult<InvitePreview> {
    Ok(ApiResponse::success(teams::preview_invite(&state, &user, &token).await?))
}

/// POST /api/invites/:token/accept
pub async fn accept(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(token): Path<String>,
) -> ApiResult<Member> {
    Ok(ApiResponse::success(teams::accept_invite(&state, &user, &token).await?))
}

/// POST /api/invites/:token/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(token): Path<String>,
) -> ApiResult<Invite> {
    Ok(ApiResponse::success(teams::reject_invite(&state, &user, &token).await?))
}
