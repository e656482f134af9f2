// handlers/protected/teams.rs - /api/teams[/:team_id]

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Team, TeamSummary};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{cleanup, teams};

#[derive(Debug, Deserialize)]
pub struct TeamBody {
    pub name: String,
}

/// GET /api/teams - Teams the caller belongs to, with their role
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Vec<TeamSummary>> {
    Ok(ApiResponse::success(teams::list_teams(&state, &user).await?))
}

/// POST /api/teams - Create a team owned by the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<TeamBody>,
) -> ApiResult<TeamSummary> {
    Ok(ApiResponse::created(teams::create_team(&state, &user, &body.name).await?))
}

/// GET /api/teams/:team_id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<TeamSummary> {
    Ok(ApiResponse::success(teams::get_team(&state, &user, team_id).await?))
}

/// PATCH /api/teams/:team_id - Rename (owner and admins)
pub async fn rename(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<TeamBody>,
) -> ApiResult<Team> {
    Ok(ApiResponse::success(teams::rename_team(&state, &user, team_id, &body.name).await?))
}

/// DELETE /api/teams/:team_id - Delete the team with its content and media
///
/// Storage that could not be removed is listed under `warnings`; the team
/// itself is gone either way.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Value> {
    let report = cleanup::delete_team(&state, &user, team_id).await?;
    Ok(ApiResponse::deleted(json!(report)))
}
