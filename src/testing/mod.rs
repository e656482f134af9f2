//! In-process fakes and a router harness for integration tests.
//!
//! `TestApp` wires the real router to the in-memory store and object store,
//! with provider, publisher, billing and mail traffic captured instead of
//! sent.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::{router, AppState};
use crate::auth::{generate_jwt, Claims};
use crate::billing::{BillingError, BillingGateway, CheckoutRequest};
use crate::config::{AppConfig, ProviderCredentials};
use crate::database::MemoryStore;
use crate::integrations::oauth::TokenRequest;
use crate::integrations::{AccountInfo, IntegrationError, ProviderSpec, TokenClient, TokenResponse};
use crate::mail::MemoryMailer;
use crate::publisher::{PublishError, PublishReceipt, PublishRequest, Publisher};
use crate::storage::MemoryObjectStore;
use crate::types::Platform;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

fn locked<T: Clone>(m: &Mutex<T>) -> T {
    m.lock().map(|v| v.clone()).unwrap_or_else(|e| e.into_inner().clone())
}

/// Token endpoint stand-in. Issues `access-N`/`refresh-N` pairs unless a
/// response has been queued.
#[derive(Default)]
pub struct FakeTokenClient {
    issued: AtomicUsize,
    queued: Mutex<VecDeque<Result<TokenResponse, String>>>,
    requests: Mutex<Vec<(Platform, TokenRequest)>>,
    revoked: Mutex<Vec<(Platform, TokenRequest)>>,
    failing_revocations: Mutex<HashSet<Platform>>,
}

impl FakeTokenClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, response: Result<TokenResponse, String>) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(response);
        }
    }

    pub fn fail_revocation(&self, platform: Platform) {
        if let Ok(mut failing) = self.failing_revocations.lock() {
            failing.insert(platform);
        }
    }

    pub fn requests(&self) -> Vec<(Platform, TokenRequest)> {
        locked(&self.requests)
    }

    pub fn revoked(&self) -> Vec<(Platform, TokenRequest)> {
        locked(&self.revoked)
    }
}

#[async_trait]
impl TokenClient for FakeTokenClient {
    async fn request_token(&self, provider: &ProviderSpec, request: TokenRequest) -> Result<TokenResponse, IntegrationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((provider.platform, request));
        }

        let queued = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        match queued {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(IntegrationError::provider(provider.platform, message)),
            None => {
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(TokenResponse {
                    access_token: format!("access-{}", n),
                    refresh_token: Some(format!("refresh-{}", n)),
                    expires_in: Some(3600),
                    scope: None,
                    account_id: None,
                })
            }
        }
    }

    async fn fetch_account(&self, provider: &ProviderSpec, _access_token: &str) -> Result<Option<AccountInfo>, IntegrationError> {
        Ok(Some(AccountInfo {
            id: format!("{}-account", provider.platform),
            name: Some(format!("{} test account", provider.platform)),
        }))
    }

    async fn revoke(&self, provider: &ProviderSpec, request: TokenRequest) -> Result<(), IntegrationError> {
        if let Ok(mut revoked) = self.revoked.lock() {
            revoked.push((provider.platform, request));
        }
        let failing = self
            .failing_revocations
            .lock()
            .map(|f| f.contains(&provider.platform))
            .unwrap_or(false);
        if failing {
            return Err(IntegrationError::provider(provider.platform, "revocation endpoint unavailable"));
        }
        Ok(())
    }
}

/// Accepts every publish except for platforms marked as failing.
#[derive(Default)]
pub struct FakePublisher {
    published: Mutex<Vec<PublishRequest>>,
    failing: Mutex<HashSet<Platform>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, platform: Platform) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(platform);
        }
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        locked(&self.published)
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(&request.platform))
            .unwrap_or(false);
        if failing {
            return Err(PublishError::Provider(format!("{} rejected the post", request.platform)));
        }

        if let Ok(mut published) = self.published.lock() {
            published.push(request.clone());
        }
        let external_id = format!("{}-post-{}", request.platform, Uuid::new_v4().simple());
        Ok(PublishReceipt {
            url: Some(format!("https://{}.test/{}", request.platform, external_id)),
            external_id,
        })
    }
}

/// Stripe stand-in returning deterministic URLs.
#[derive(Default)]
pub struct FakeBilling {
    customers: AtomicUsize,
    checkouts: Mutex<Vec<CheckoutRequest>>,
}

impl FakeBilling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customers_created(&self) -> usize {
        self.customers.load(Ordering::SeqCst)
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        locked(&self.checkouts)
    }
}

#[async_trait]
impl BillingGateway for FakeBilling {
    async fn create_customer(&self, _team_id: Uuid, _team_name: &str, _email: &str) -> Result<String, BillingError> {
        let n = self.customers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cus_test_{}", n))
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, BillingError> {
        if let Ok(mut checkouts) = self.checkouts.lock() {
            checkouts.push(request.clone());
        }
        Ok(format!("https://checkout.stripe.test/{}", request.price_id))
    }

    async fn create_portal_session(&self, customer_id: &str, _return_url: &str) -> Result<String, BillingError> {
        Ok(format!("https://billing.stripe.test/{}", customer_id))
    }
}

/// Development config with every provider and plan configured.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.in_memory = true;
    config.storage.in_memory = true;
    config.storage.delete_backoff_ms = 1;
    config.api.enable_request_logging = false;
    config.api.public_url = "http://api.test".to_string();
    config.api.app_url = "http://app.test".to_string();

    for platform in Platform::ALL {
        config.integrations.credentials.insert(
            *platform,
            ProviderCredentials {
                client_id: format!("{}-client", platform),
                client_secret: format!("{}-secret", platform),
            },
        );
    }

    config.billing.stripe_secret_key = "sk_test".to_string();
    config.billing.stripe_webhook_secret = WEBHOOK_SECRET.to_string();
    for plan in ["starter", "pro", "agency"] {
        config.billing.prices.insert(plan.to_string(), format!("price_{}", plan));
    }
    config
}

/// A user known to the app, with a bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub config: Arc<AppConfig>,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub tokens: Arc<FakeTokenClient>,
    pub publisher: Arc<FakePublisher>,
    pub billing: Arc<FakeBilling>,
    pub mailer: MemoryMailer,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(MemoryStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let tokens = Arc::new(FakeTokenClient::new());
        let publisher = Arc::new(FakePublisher::new());
        let billing = Arc::new(FakeBilling::new());
        let mailer = MemoryMailer::new();

        let state = AppState::new(
            config.clone(),
            store.clone(),
            objects.clone(),
            tokens.clone(),
            publisher.clone(),
            billing.clone(),
            Arc::new(mailer.clone()),
        );

        Self {
            router: router(state.clone()),
            config,
            state,
            store,
            objects,
            tokens,
            publisher,
            billing,
            mailer,
        }
    }

    /// Bearer token for an arbitrary identity.
    pub fn token_for(&self, user_id: Uuid, email: &str) -> String {
        let claims = Claims::new(user_id, email, None, 1);
        generate_jwt(&claims, &self.config.security.jwt_secret).unwrap_or_default()
    }

    /// A user that has made one authenticated call, so it exists in the store.
    pub async fn user(&self, email: &str) -> TestUser {
        let id = Uuid::new_v4();
        let token = self.token_for(id, email);
        self.get("/api/me", Some(&token)).await;
        TestUser {
            id,
            email: email.to_string(),
            token,
        }
    }

    pub async fn admin(&self, email: &str) -> TestUser {
        let user = self.user(email).await;
        let _ = self.store.set_admin(user.id, true).await;
        user
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let request = match builder.body(body) {
            Ok(request) => request,
            Err(e) => return (StatusCode::BAD_REQUEST, Value::String(e.to_string())),
        };
        self.send(request).await
    }

    /// Send a prepared request through the router.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap_or_default();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, json)
    }

    /// Raw response, for redirects and headers.
    pub async fn send_raw(&self, request: Request<Body>) -> axum::response::Response {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
