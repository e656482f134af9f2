// handlers/public/billing.rs - POST /api/billing/webhook

use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// POST /api/billing/webhook - Stripe event delivery
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes rather than JSON.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Value> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Stripe-Signature header"))?;

    let event = state.billing.handle_webhook(&body, signature).await?;
    Ok(ApiResponse::success(json!({ "received": true, "event": event })))
}
