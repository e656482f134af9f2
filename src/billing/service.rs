use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::webhook::{parse_event, verify_signature, BillingEvent};
use super::{BillingError, BillingGateway, CheckoutRequest, PLANS};
use crate::config::AppConfig;
use crate::database::models::{Subscription, Team};
use crate::database::Store;

/// Team subscriptions: checkout, customer portal and webhook bookkeeping.
pub struct BillingService {
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    gateway: Arc<dyn BillingGateway>,
}

impl BillingService {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn Store>, gateway: Arc<dyn BillingGateway>) -> Self {
        Self { config, store, gateway }
    }

    fn billing_url(&self, team_id: Uuid, query: &str) -> String {
        format!("{}/teams/{}/billing{}", self.config.api.app_url, team_id, query)
    }

    pub async fn subscription(&self, team_id: Uuid) -> Result<Option<Subscription>, BillingError> {
        Ok(self.store.get_subscription(team_id).await?)
    }

    /// Hosted checkout URL for `plan`. Creates the Stripe customer on first use.
    pub async fn checkout(&self, team: &Team, email: &str, plan: &str) -> Result<String, BillingError> {
        if !PLANS.contains(&plan) {
            return Err(BillingError::UnknownPlan(plan.to_string()));
        }
        let price_id = self
            .config
            .billing
            .prices
            .get(plan)
            .filter(|p| !p.is_empty())
            .cloned()
            .ok_or_else(|| BillingError::NotConfigured(format!("no price for plan '{}'", plan)))?;

        let customer_id = match self.store.get_subscription(team.id).await? {
            Some(existing) => existing.stripe_customer_id,
            None => {
                let customer_id = self.gateway.create_customer(team.id, &team.name, email).await?;
                self.store
                    .save_subscription(&Subscription {
                        team_id: team.id,
                        stripe_customer_id: customer_id.clone(),
                        stripe_subscription_id: None,
                        plan: None,
                        status: "incomplete".to_string(),
                        current_period_end: None,
                        updated_at: Utc::now(),
                    })
                    .await?;
                info!("Created Stripe customer {} for team {}", customer_id, team.id);
                customer_id
            }
        };

        self.gateway
            .create_checkout_session(&CheckoutRequest {
                customer_id,
                price_id,
                team_id: team.id,
                plan: plan.to_string(),
                success_url: self.billing_url(team.id, "?checkout=success"),
                cancel_url: self.billing_url(team.id, "?checkout=cancelled"),
            })
            .await
    }

    /// Billing portal URL, or `None` when the team never started checkout.
    pub async fn portal(&self, team_id: Uuid) -> Result<Option<String>, BillingError> {
        let Some(subscription) = self.store.get_subscription(team_id).await? else {
            return Ok(None);
        };
        let url = self
            .gateway
            .create_portal_session(&subscription.stripe_customer_id, &self.billing_url(team_id, ""))
            .await?;
        Ok(Some(url))
    }

    /// Verify and apply a webhook delivery. Returns the event type handled.
    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> Result<String, BillingError> {
        let secret = &self.config.billing.stripe_webhook_secret;
        if secret.is_empty() {
            return Err(BillingError::NotConfigured("STRIPE_WEBHOOK_SECRET is not set".to_string()));
        }
        verify_signature(
            payload,
            signature,
            secret,
            self.config.billing.webhook_tolerance_secs,
            Utc::now(),
        )?;

        match parse_event(payload)? {
            BillingEvent::CheckoutCompleted {
                team_id,
                customer_id,
                subscription_id,
                plan,
            } => {
                if self.store.get_team(team_id).await?.is_none() {
                    warn!("Checkout completed for unknown team {}", team_id);
                    return Ok("checkout.session.completed".to_string());
                }
                let mut subscription = self.store.get_subscription(team_id).await?.unwrap_or(Subscription {
                    team_id,
                    stripe_customer_id: customer_id.clone(),
                    stripe_subscription_id: None,
                    plan: None,
                    status: "incomplete".to_string(),
                    current_period_end: None,
                    updated_at: Utc::now(),
                });
                subscription.stripe_customer_id = customer_id;
                subscription.stripe_subscription_id = subscription_id.or(subscription.stripe_subscription_id);
                subscription.plan = plan.or(subscription.plan);
                subscription.status = "active".to_string();
                self.store.save_subscription(&subscription).await?;
                info!("Activated subscription for team {}", team_id);
                Ok("checkout.session.completed".to_string())
            }

            BillingEvent::SubscriptionUpdated {
                customer_id,
                subscription_id,
                status,
                price_id,
                current_period_end,
            } => {
                let Some(mut subscription) = self.store.get_subscription_by_customer(&customer_id).await? else {
                    warn!("Subscription update for unknown customer {}", customer_id);
                    return Ok("customer.subscription.updated".to_string());
                };
                subscription.stripe_subscription_id = Some(subscription_id);
                subscription.status = status;
                if let Some(plan) = price_id.as_deref().and_then(|p| self.config.billing.plan_for_price(p)) {
                    subscription.plan = Some(plan.to_string());
                }
                if current_period_end.is_some() {
                    subscription.current_period_end = current_period_end;
                }
                self.store.save_subscription(&subscription).await?;
                info!(
                    "Subscription for team {} is now {}",
                    subscription.team_id, subscription.status
                );
                Ok("customer.subscription.updated".to_string())
            }

            BillingEvent::SubscriptionDeleted {
                customer_id,
                subscription_id,
            } => {
                let Some(mut subscription) = self.store.get_subscription_by_customer(&customer_id).await? else {
                    warn!("Subscription deletion for unknown customer {}", customer_id);
                    return Ok("customer.subscription.deleted".to_string());
                };
                subscription.stripe_subscription_id = Some(subscription_id);
                subscription.status = "canceled".to_string();
                self.store.save_subscription(&subscription).await?;
                info!("Canceled subscription for team {}", subscription.team_id);
                Ok("customer.subscription.deleted".to_string())
            }

            BillingEvent::Ignored(event_type) => {
                tracing::debug!("Ignoring Stripe event {}", event_type);
                Ok(event_type)
            }
        }
    }
}
