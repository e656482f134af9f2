//! Workflows behind the HTTP handlers. Each function loads the facts an
//! authorization check needs, runs the check, then touches storage.

pub mod cleanup;
pub mod content;
pub mod publishing;
pub mod teams;

use uuid::Uuid;

use crate::database::models::Member;
use crate::database::Store;
use crate::error::ApiError;

/// The caller's membership in `team_id`. Non-members get the same 404 as a
/// missing team.
pub async fn require_member(store: &dyn Store, team_id: Uuid, user_id: Uuid) -> Result<Member, ApiError> {
    store
        .get_member(team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))
}
