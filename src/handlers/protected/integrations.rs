// handlers/protected/integrations.rs - /api/teams/:team_id/integrations

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::access::{check_team, TeamAction};
use crate::app::AppState;
use crate::database::models::Connection;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::require_member;
use crate::types::Platform;

async fn require_manager(state: &AppState, user: &AuthUser, team_id: Uuid) -> Result<(), ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_team(member.role, TeamAction::ManageIntegrations)?;
    Ok(())
}

/// GET /api/teams/:team_id/integrations - Connected platforms, no tokens
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Vec<Connection>> {
    require_member(state.store.as_ref(), team_id, user.id).await?;
    Ok(ApiResponse::success(state.store.list_connections(team_id).await?))
}

/// POST /api/teams/:team_id/integrations/:platform/authorize
///
/// Returns the provider consent URL; the browser is sent there by the client.
pub async fn authorize(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, platform)): Path<(Uuid, Platform)>,
) -> ApiResult<Value> {
    require_manager(&state, &user, team_id).await?;
    let url = state.integrations.authorization_url(team_id, user.id, platform)?;
    Ok(ApiResponse::success(json!({ "platform": platform, "url": url })))
}

/// POST /api/teams/:team_id/integrations/:platform/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, platform)): Path<(Uuid, Platform)>,
) -> ApiResult<Connection> {
    require_manager(&state, &user, team_id).await?;
    Ok(ApiResponse::success(state.integrations.refresh(team_id, platform).await?))
}

/// DELETE /api/teams/:team_id/integrations/:platform
///
/// Revocation at the provider is best effort; the connection is removed
/// regardless and any revocation failure is returned as a warning.
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((team_id, platform)): Path<(Uuid, Platform)>,
) -> ApiResult<Value> {
    require_manager(&state, &user, team_id).await?;
    let warning = state.integrations.disconnect(team_id, platform).await?;
    Ok(ApiResponse::deleted(json!({
        "platform": platform,
        "warnings": warning.into_iter().collect::<Vec<_>>(),
    })))
}
