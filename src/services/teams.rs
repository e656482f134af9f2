use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::require_member;
use crate::access::{check_invite, check_remove, check_role_change, check_team, TeamAction};
use crate::app::AppState;
use crate::database::models::{Invite, Member, NewInvite, Team, TeamSummary};
use crate::error::ApiError;
use crate::mail::EmailMessage;
use crate::middleware::AuthUser;
use crate::types::{InviteStatus, Role};

pub const INVITE_TTL_DAYS: i64 = 7;
const INVITE_TOKEN_LEN: usize = 32;

/// Trimmed team name, 2 to 100 characters.
pub fn validate_team_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(ApiError::invalid_field("name", "Team name must be between 2 and 100 characters"));
    }
    Ok(name.to_string())
}

/// Lower-cased, trimmed email with a minimal shape check.
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ApiError::invalid_field("email", "A valid email address is required"));
    }
    Ok(email)
}

/// Invite emails are stored normalized; the caller's may not be.
fn addressed_to(invite_email: &str, user_email: &str) -> bool {
    user_email.trim().to_lowercase() == invite_email
}

fn invite_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub async fn create_team(state: &AppState, user: &AuthUser, name: &str) -> Result<TeamSummary, ApiError> {
    let name = validate_team_name(name)?;
    let team = state.store.create_team(&name, user.id).await?;
    info!("User {} created team {}", user.id, team.id);
    Ok(TeamSummary { team, role: Role::Owner })
}

pub async fn list_teams(state: &AppState, user: &AuthUser) -> Result<Vec<TeamSummary>, ApiError> {
    Ok(state.store.list_user_teams(user.id).await?)
}

pub async fn get_team(state: &AppState, user: &AuthUser, team_id: Uuid) -> Result<TeamSummary, ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    let team = load_team(state, team_id).await?;
    Ok(TeamSummary { team, role: member.role })
}

pub(crate) async fn load_team(state: &AppState, team_id: Uuid) -> Result<Team, ApiError> {
    state
        .store
        .get_team(team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))
}

pub async fn rename_team(state: &AppState, user: &AuthUser, team_id: Uuid, name: &str) -> Result<Team, ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_team(member.role, TeamAction::Rename)?;
    let name = validate_team_name(name)?;
    Ok(state.store.rename_team(team_id, &name).await?)
}

pub async fn list_members(state: &AppState, user: &AuthUser, team_id: Uuid) -> Result<Vec<Member>, ApiError> {
    require_member(state.store.as_ref(), team_id, user.id).await?;
    Ok(state.store.list_members(team_id).await?)
}

async fn target_member(state: &AppState, team_id: Uuid, user_id: Uuid) -> Result<Member, ApiError> {
    state
        .store
        .get_member(team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))
}

pub async fn update_member_role(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    target_id: Uuid,
    role: Role,
) -> Result<Member, ApiError> {
    let actor = require_member(state.store.as_ref(), team_id, user.id).await?;
    let target = target_member(state, team_id, target_id).await?;
    check_role_change(actor.role, target.role, role)?;

    let updated = state.store.update_member_role(team_id, target_id, role).await?;
    info!("{} changed {} from {} to {} in team {}", user.id, target_id, target.role, role, team_id);
    Ok(updated)
}

pub async fn remove_member(state: &AppState, user: &AuthUser, team_id: Uuid, target_id: Uuid) -> Result<(), ApiError> {
    let actor = require_member(state.store.as_ref(), team_id, user.id).await?;
    let target = target_member(state, team_id, target_id).await?;
    check_remove(actor.role, target.role, target_id == user.id)?;

    state.store.remove_member(team_id, target_id).await?;
    info!("Removed {} from team {}", target_id, team_id);
    Ok(())
}

/// Invite plus a warning when the email could not be delivered
#[derive(Debug, Serialize)]
pub struct CreatedInvite {
    #[serde(flatten)]
    pub invite: Invite,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub async fn create_invite(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    email: &str,
    role: Role,
) -> Result<CreatedInvite, ApiError> {
    let inviter = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_invite(inviter.role, role)?;
    let email = normalize_email(email)?;
    let team = load_team(state, team_id).await?;

    let token = invite_token();
    let invite = state
        .store
        .create_invite(NewInvite {
            team_id,
            email: email.clone(),
            role,
            token: token.clone(),
            invited_by: user.id,
            expires_at: Utc::now() + Duration::days(INVITE_TTL_DAYS),
        })
        .await?;
    info!("Invited {} to team {} as {}", email, team_id, role);

    // The row is committed; delivery problems only produce a warning.
    let accept_url = format!("{}/invites/{}", state.config.api.app_url, token);
    let inviter_name = user.name.as_deref().unwrap_or(&user.email);
    let message = EmailMessage::invitation(&email, &team.name, inviter_name, role, &accept_url);

    let mut warnings = Vec::new();
    if let Err(e) = state.mailer.send(&message).await {
        warn!("Could not send invitation {} to {}: {}", invite.id, email, e);
        warnings.push(format!("Invitation email could not be sent: {}", e));
    }

    Ok(CreatedInvite { invite, warnings })
}

pub async fn list_invites(state: &AppState, user: &AuthUser, team_id: Uuid) -> Result<Vec<Invite>, ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_team(member.role, TeamAction::ViewInvites)?;
    Ok(state.store.list_invites(team_id).await?)
}

pub async fn cancel_invite(state: &AppState, user: &AuthUser, team_id: Uuid, invite_id: Uuid) -> Result<Invite, ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_team(member.role, TeamAction::ViewInvites)?;

    let invite = state
        .store
        .get_invite(invite_id)
        .await?
        .filter(|i| i.team_id == team_id)
        .ok_or_else(|| ApiError::not_found("Invite not found"))?;
    if invite.status != InviteStatus::Pending {
        return Err(ApiError::conflict(format!("Invite is already {}", invite.status)));
    }

    Ok(state.store.set_invite_status(invite.id, InviteStatus::Rejected).await?)
}

/// Invite addressed to the caller and still open. A lapsed invite is marked
/// `EXPIRED` on the way out.
async fn open_invite_for(state: &AppState, user: &AuthUser, token: &str) -> Result<Invite, ApiError> {
    let invite = state
        .store
        .get_invite_by_token(token)
        .await?
        .ok_or_else(|| ApiError::not_found("Invite not found"))?;

    if !addressed_to(&invite.email, &user.email) {
        return Err(ApiError::forbidden("This invitation was sent to a different email address"));
    }
    if invite.status != InviteStatus::Pending {
        return Err(ApiError::conflict(format!("Invite is already {}", invite.status)));
    }
    if invite.is_expired(Utc::now()) {
        state.store.set_invite_status(invite.id, InviteStatus::Expired).await?;
        return Err(ApiError::gone("Invite has expired"));
    }
    Ok(invite)
}

/// Invite details for the acceptance page
#[derive(Debug, Serialize)]
pub struct InvitePreview {
    #[serde(flatten)]
    pub invite: Invite,
    pub team_name: String,
}

pub async fn preview_invite(state: &AppState, user: &AuthUser, token: &str) -> Result<InvitePreview, ApiError> {
    let invite = open_invite_for(state, user, token).await?;
    let team = load_team(state, invite.team_id).await?;
    Ok(InvitePreview {
        invite,
        team_name: team.name,
    })
}

pub async fn accept_invite(state: &AppState, user: &AuthUser, token: &str) -> Result<Member, ApiError> {
    let invite = open_invite_for(state, user, token).await?;
    let member = state.store.accept_invite(invite.id, user.id).await?;
    info!("{} joined team {} as {}", user.id, member.team_id, member.role);
    Ok(member)
}

pub async fn reject_invite(state: &AppState, user: &AuthUser, token: &str) -> Result<Invite, ApiError> {
    let invite = open_invite_for(state, user, token).await?;
    Ok(state.store.set_invite_status(invite.id, InviteStatus::Rejected).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_names_are_trimmed_and_bounded() {
        assert_eq!(validate_team_name("  Acme  ").unwrap(), "Acme");
        assert!(validate_team_name(" a ").is_err());
        assert!(validate_team_name(&"x".repeat(101)).is_err());
        assert!(validate_team_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@localhost").is_err());
        assert!(normalize_email("a b@example.com").is_err());
    }

    #[test]
    fn invites_match_emails_beyond_ascii() {
        let stored = normalize_email("Émile@Exämple.org").unwrap();
        assert!(addressed_to(&stored, " ÉMILE@EXÄMPLE.ORG "));
        assert!(addressed_to(&stored, "émile@exämple.org"));
        assert!(!addressed_to(&stored, "emile@example.org"));
    }

    #[test]
    fn invite_tokens_are_random_and_sized() {
        let a = invite_token();
        let b = invite_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
