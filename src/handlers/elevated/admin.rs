// handlers/elevated/admin.rs - DELETE /api/admin/users/:user_id

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::cleanup;

/// DELETE /api/admin/users/:user_id - Remove a user account
///
/// Deletes the teams the user owns (with their content, members, invites,
/// connections and subscription), the user's memberships and authored
/// content elsewhere, then tombstones the account so its token can no longer
/// recreate it. Storage cleanup runs after the database commit; leftovers are
/// returned as `warnings`.
pub async fn user_delete(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Value> {
    let report = cleanup::delete_user(&state, &admin, user_id).await?;

    let mut body = json!(report);
    body["user_id"] = json!(user_id);
    Ok(ApiResponse::deleted(body))
}
