//! Application state and the HTTP router.

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::billing::{BillingGateway, BillingService, StripeClient};
use crate::config::AppConfig;
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::handlers::{elevated, protected, public};
use crate::integrations::{HttpTokenClient, IntegrationService, TokenClient};
use crate::mail::{self, Mailer};
use crate::middleware::{jwt_auth_middleware, require_admin};
use crate::publisher::{HttpPublisher, Publisher};
use crate::storage::{MemoryObjectStore, ObjectCleaner, ObjectStore, S3ObjectStore};

/// Shared dependencies handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub objects: Arc<dyn ObjectStore>,
    pub cleaner: ObjectCleaner,
    pub integrations: Arc<IntegrationService>,
    pub publisher: Arc<dyn Publisher>,
    pub billing: Arc<BillingService>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        token_client: Arc<dyn TokenClient>,
        publisher: Arc<dyn Publisher>,
        billing_gateway: Arc<dyn BillingGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            cleaner: ObjectCleaner::new(objects.clone(), &config.storage),
            integrations: Arc::new(IntegrationService::new(config.clone(), store.clone(), token_client)),
            billing: Arc::new(BillingService::new(config.clone(), store.clone(), billing_gateway)),
            config,
            store,
            objects,
            publisher,
            mailer,
        }
    }

    /// Production wiring: Postgres or in-memory store, S3 or in-memory
    /// objects, and real provider clients.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store: Arc<dyn Store> = if config.database.in_memory {
            warn!("Using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        } else {
            let pool = DatabaseManager::connect_lazy(&config.database)?;
            if config.database.run_migrations {
                DatabaseManager::migrate(&pool).await?;
            }
            Arc::new(PgStore::new(pool))
        };

        let objects: Arc<dyn ObjectStore> = if config.storage.in_memory {
            warn!("Using in-memory object storage");
            Arc::new(MemoryObjectStore::new())
        } else {
            Arc::new(S3ObjectStore::from_config(&config.storage).await)
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("uplora-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::new(
            config.clone(),
            store,
            objects.clone(),
            Arc::new(HttpTokenClient::new(http.clone())),
            Arc::new(HttpPublisher::new(http.clone(), objects)),
            Arc::new(StripeClient::new(http.clone(), config.billing.stripe_secret_key.clone())),
            mail::from_config(&config.mail, http),
        ))
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .merge(elevated_routes(state.clone()))
        .layer(cors_layer(&state.config));

    if state.config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if config.security.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Tier 1: no authentication
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/integrations/:platform/callback", get(public::oauth_callback))
        .route("/api/billing/webhook", post(public::stripe_webhook))
}

/// Tier 2: bearer token required
fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::*;

    Router::new()
        .route("/api/me", get(me_get))
        // Teams
        .route("/api/teams", get(teams_list).post(teams_create))
        .route(
            "/api/teams/:team_id",
            get(team_get).patch(team_rename).delete(team_delete),
        )
        .route("/api/teams/:team_id/members", get(members_list))
        .route(
            "/api/teams/:team_id/members/:user_id",
            patch(member_update).delete(member_remove),
        )
        // Invitations
        .route("/api/teams/:team_id/invites", get(invites_list).post(invite_create))
        .route("/api/teams/:team_id/invites/:invite_id", delete(invite_cancel))
        .route("/api/invites/:token", get(invite_preview))
        .route("/api/invites/:token/accept", post(invite_accept))
        .route("/api/invites/:token/reject", post(invite_reject))
        // Content
        .route("/api/teams/:team_id/uploads", post(upload_create))
        .route(
            "/api/teams/:team_id/content/:kind",
            get(content_list).post(content_create),
        )
        .route(
            "/api/teams/:team_id/content/:kind/:id",
            get(content_get).patch(content_update).delete(content_delete),
        )
        .route("/api/teams/:team_id/content/:kind/:id/media", get(content_media))
        .route("/api/teams/:team_id/content/:kind/:id/submit", post(content_submit))
        .route("/api/teams/:team_id/content/:kind/:id/approve", post(content_approve))
        .route("/api/teams/:team_id/content/:kind/:id/reject", post(content_reject))
        .route("/api/teams/:team_id/content/:kind/:id/publish", post(content_publish))
        // Integrations
        .route("/api/teams/:team_id/integrations", get(integrations_list))
        .route(
            "/api/teams/:team_id/integrations/:platform",
            delete(integration_disconnect),
        )
        .route(
            "/api/teams/:team_id/integrations/:platform/authorize",
            post(integration_authorize),
        )
        .route(
            "/api/teams/:team_id/integrations/:platform/refresh",
            post(integration_refresh),
        )
        // Billing
        .route("/api/teams/:team_id/billing", get(billing_get))
        .route("/api/teams/:team_id/billing/checkout", post(billing_checkout))
        .route("/api/teams/:team_id/billing/portal", post(billing_portal))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

/// Tier 3: platform administrators only
fn elevated_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/users/:user_id", delete(elevated::admin_user_delete))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", state.config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    info!("Uplora API listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
