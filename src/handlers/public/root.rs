// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - Service information
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Uplora API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Team content approval and multi-platform publishing",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "me": "/api/me (protected)",
                "teams": "/api/teams[/:team_id] (protected)",
                "members": "/api/teams/:team_id/members[/:user_id] (protected)",
                "invites": "/api/teams/:team_id/invites, /api/invites/:token (protected)",
                "content": "/api/teams/:team_id/content/:kind[/:id] (protected)",
                "uploads": "/api/teams/:team_id/uploads (protected)",
                "integrations": "/api/teams/:team_id/integrations[/:platform] (protected)",
                "oauth_callback": "/api/integrations/:platform/callback (public)",
                "billing": "/api/teams/:team_id/billing (protected)",
                "billing_webhook": "/api/billing/webhook (public, signed)",
                "admin": "/api/admin/users/:user_id (platform admins)",
            }
        }
    }))
}

/// GET /health - Database connectivity check
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
