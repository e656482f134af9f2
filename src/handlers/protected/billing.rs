// handlers/protected/billing.rs - /api/teams/:team_id/billing

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::access::{check_team, TeamAction};
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{require_member, teams};

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub plan: String,
}

/// GET /api/teams/:team_id/billing - Plan and status, readable by members
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Value> {
    require_member(state.store.as_ref(), team_id, user.id).await?;
    let subscription = state.billing.subscription(team_id).await?;

    Ok(ApiResponse::success(match subscription {
        Some(s) => json!({
            "plan": s.plan,
            "status": s.status,
            "current_period_end": s.current_period_end,
        }),
        None => json!({ "plan": null, "status": "none" }),
    }))
}

/// POST /api/teams/:team_id/billing/checkout - Stripe Checkout URL (owner)
pub async fn checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<CheckoutBody>,
) -> ApiResult<Value> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_team(member.role, TeamAction::ManageBilling)?;
    let team = teams::load_team(&state, team_id).await?;

    let url = state.billing.checkout(&team, &user.email, &body.plan).await?;
    Ok(ApiResponse::success(json!({ "url": url })))
}

/// POST /api/teams/:team_id/billing/portal - Stripe billing portal URL (owner)
pub async fn portal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Value> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    check_team(member.role, TeamAction::ManageBilling)?;

    let url = state
        .billing
        .portal(team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("This team has no billing account yet"))?;
    Ok(ApiResponse::success(json!({ "url": url })))
}
