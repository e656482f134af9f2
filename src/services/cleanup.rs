//! Deletion flows that span the database and object storage.
//!
//! The database change always commits first. Storage is cleaned afterwards
//! and anything left behind is reported as a warning; a failed database
//! step leaves storage untouched.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::content::{actor, load_post};
use super::require_member;
use crate::access::{check_content, check_team, ContentAction, TeamAction};
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::storage::{team_prefix, CleanupReport};
use crate::types::ContentKind;

#[derive(Debug, Default, Serialize)]
pub struct DeletionReport {
    pub objects_deleted: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub objects_failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl DeletionReport {
    fn absorb(&mut self, report: CleanupReport) {
        self.warnings.extend(report.warnings());
        self.objects_deleted += report.deleted;
        self.objects_failed.extend(report.failed);
    }
}

pub async fn delete_content(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    id: Uuid,
) -> Result<DeletionReport, ApiError> {
    let (member, post) = load_post(state, user, team_id, kind, id).await?;
    check_content(actor(&member, &post), ContentAction::Delete, post.status)?;

    let deleted = state
        .store
        .delete_post(kind, team_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} post not found", kind)))?;
    info!("{} deleted {} post {} in team {}", user.id, kind, id, team_id);

    let mut report = DeletionReport::default();
    report.absorb(state.cleaner.cleanup_keys(&deleted.object_keys()).await);
    if !report.warnings.is_empty() {
        warn!("Storage cleanup for {} post {} was incomplete", kind, id);
    }
    Ok(report)
}

pub async fn delete_team(state: &AppState, user: &AuthUser, team_id: Uuid) -> Result<DeletionReport, ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_team(member.role, TeamAction::DeleteTeam)?;

    let mut report = DeletionReport::default();
    let connections = state.store.list_connections(team_id).await?;
    report.warnings.extend(state.integrations.revoke_all(&connections).await);

    if !state.store.delete_team(team_id).await? {
        return Err(ApiError::not_found("Team not found"));
    }
    info!("{} deleted team {}", user.id, team_id);

    report.absorb(state.cleaner.cleanup_prefix(&team_prefix(team_id)).await);
    Ok(report)
}

/// Platform-admin removal of a user account with everything it owns.
pub async fn delete_user(state: &AppState, admin: &AuthUser, user_id: Uuid) -> Result<DeletionReport, ApiError> {
    if admin.id == user_id {
        return Err(ApiError::bad_request("Administrators cannot delete their own account"));
    }
    state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut report = DeletionReport::default();

    // Revocation needs the tokens, which the transaction removes
    let planned = state.store.user_footprint(user_id).await?;
    report.warnings.extend(state.integrations.revoke_all(&planned.connections).await);

    let footprint = state.store.delete_user(user_id).await?;
    info!(
        "Admin {} deleted user {} ({} owned teams)",
        admin.id,
        user_id,
        footprint.owned_team_ids.len()
    );

    for team_id in &footprint.owned_team_ids {
        report.absorb(state.cleaner.cleanup_prefix(&team_prefix(*team_id)).await);
    }
    report.absorb(state.cleaner.cleanup_keys(&footprint.authored_object_keys).await);

    if !report.warnings.is_empty() {
        warn!("Deletion of user {} finished with {} warning(s)", user_id, report.warnings.len());
    }
    Ok(report)
}
