//! Stripe subscriptions per team.

pub mod service;
pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::StoreError;

pub use service::BillingService;
pub use stripe::StripeClient;

/// Plans offered at checkout
pub const PLANS: &[&str] = &["starter", "pro", "agency"];

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("billing is not configured: {0}")]
    NotConfigured(String),

    #[error("unknown plan '{0}'")]
    UnknownPlan(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("stripe error: {0}")]
    Stripe(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub team_id: Uuid,
    pub plan: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Seam over the Stripe REST API
#[async_trait]
pub trait BillingGateway: Send + Sync + 'static {
    async fn create_customer(&self, team_id: Uuid, team_name: &str, email: &str) -> Result<String, BillingError>;

    /// Returns the hosted checkout URL.
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, BillingError>;

    /// Returns the billing portal URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError>;
}
