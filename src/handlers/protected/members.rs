// handlers/protected/members.rs - /api/teams/:team_id/members[/:user_id]

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Member;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::teams;
use crate::types::Role;

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub role: Role,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<Member>> {
    Ok(ApiResponse::success(teams::list_members(&state, &user, team_id).await?))
}

/// PATCH /api/teams/:team_id/members/:user_id - Change a member's role
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<RoleBody>,
) -> ApiResult<Member> {
    let member = teams::update_member_role(&state, &user, team_id, member_id, body.role).await?;
    Ok(ApiResponse::success(member))
}

/// DELETE /api/teams/:team_id/members/:user_id - Remove a member, or leave
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Value> {
    teams::remove_member(&state, &user, team_id, member_id).await?;
    Ok(ApiResponse::deleted(json!({ "user_id": member_id })))
}
