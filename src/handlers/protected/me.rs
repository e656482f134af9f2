// handlers/protected/me.rs - GET /api/me

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::teams;

/// GET /api/me - The authenticated user and the teams they belong to
pub async fn get(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let teams = teams::list_teams(&state, &user).await?;

    Ok(ApiResponse::success(json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
        "is_admin": user.is_admin,
        "teams": teams,
    })))
}
