// handlers/public/integrations.rs - GET /api/integrations/:platform/callback

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::warn;

use crate::access::{check_team, TeamAction};
use crate::app::AppState;
use crate::error::ApiError;
use crate::types::Platform;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /api/integrations/:platform/callback - OAuth redirect target
///
/// The signed `state` identifies the team and the member who started the
/// flow. On success the browser is sent back to the team's integrations page.
pub async fn callback(
    State(state): State<AppState>,
    Path(platform): Path<Platform>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, ApiError> {
    if let Some(error) = query.error {
        let detail = query.error_description.unwrap_or_else(|| error.clone());
        warn!("{} authorization was not granted: {}", platform, detail);
        return Err(ApiError::bad_request(format!("{} authorization failed: {}", platform, detail)));
    }

    let signed = query
        .state
        .ok_or_else(|| ApiError::invalid_field("state", "Missing OAuth state"))?;
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::invalid_field("code", "Missing authorization code"))?;

    let oauth = state.integrations.verify_state(platform, &signed)?;

    // The member may have lost access while at the provider
    let member = state
        .store
        .get_member(oauth.team_id, oauth.user_id)
        .await?
        .ok_or_else(|| ApiError::forbidden("You are no longer a member of this team"))?;
    check_team(member.role, TeamAction::ManageIntegrations)?;

    state.integrations.complete(&oauth, &code).await?;

    Ok(Redirect::to(&format!(
        "{}/teams/{}/integrations?connected={}",
        state.config.api.app_url, oauth.team_id, platform
    )))
}
