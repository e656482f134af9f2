use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{BillingError, BillingGateway, CheckoutRequest};

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Minimal Stripe client over form-encoded REST calls
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, secret_key: impl Into<String>) -> Self {
        Self {
            http,
            secret_key: secret_key.into(),
        }
    }

    async fn post(&self, path: &str, form: &[(&str, String)]) -> Result<Value, BillingError> {
        if self.secret_key.is_empty() {
            return Err(BillingError::NotConfigured("STRIPE_SECRET_KEY is not set".to_string()));
        }

        let response = self
            .http
            .post(format!("{}{}", STRIPE_API, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| BillingError::Stripe(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| BillingError::Stripe(format!("unreadable response: {}", e)))?;
        debug!("POST {} -> {}", path, status);

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(BillingError::Stripe(message));
        }
        Ok(body)
    }

    fn field(body: &Value, name: &str) -> Result<String, BillingError> {
        body[name]
            .as_str()
            .map(String::from)
            .ok_or_else(|| BillingError::Stripe(format!("response is missing '{}'", name)))
    }
}

#[async_trait]
impl BillingGateway for StripeClient {
    async fn create_customer(&self, team_id: Uuid, team_name: &str, email: &str) -> Result<String, BillingError> {
        let body = self
            .post(
                "/customers",
                &[
                    ("email", email.to_string()),
                    ("name", team_name.to_string()),
                    ("metadata[team_id]", team_id.to_string()),
                ],
            )
            .await?;
        Self::field(&body, "id")
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, BillingError> {
        let body = self
            .post(
                "/checkout/sessions",
                &[
                    ("mode", "subscription".to_string()),
                    ("customer", request.customer_id.clone()),
                    ("client_reference_id", request.team_id.to_string()),
                    ("line_items[0][price]", request.price_id.clone()),
                    ("line_items[0][quantity]", "1".to_string()),
                    ("metadata[plan]", request.plan.clone()),
                    ("subscription_data[metadata][team_id]", request.team_id.to_string()),
                    ("success_url", request.success_url.clone()),
                    ("cancel_url", request.cancel_url.clone()),
                ],
            )
            .await?;
        Self::field(&body, "url")
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError> {
        let body = self
            .post(
                "/billing_portal/sessions",
                &[("customer", customer_id.to_string()), ("return_url", return_url.to_string())],
            )
            .await?;
        Self::field(&body, "url")
    }
}
