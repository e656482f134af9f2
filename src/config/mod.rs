use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

use crate::types::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub integrations: IntegrationsConfig,
    pub billing: BillingConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
    /// Use the in-memory store instead of Postgres (development only).
    pub in_memory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    /// Externally reachable base URL of this API, used for OAuth redirect URIs.
    pub public_url: String,
    /// Base URL of the web application that users return to.
    pub app_url: String,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Secret from which the OAuth token encryption key is derived.
    pub token_encryption_secret: String,
    pub oauth_state_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub in_memory: bool,
    pub upload_url_ttl_secs: u64,
    pub download_url_ttl_secs: u64,
    pub delete_batch_size: usize,
    pub delete_attempts: u32,
    pub delete_backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    pub credentials: HashMap<Platform, ProviderCredentials>,
    /// Refresh access tokens that expire within this window before use.
    pub refresh_skew_secs: i64,
}

impl IntegrationsConfig {
    pub fn credentials(&self, platform: Platform) -> Option<&ProviderCredentials> {
        self.credentials
            .get(&platform)
            .filter(|c| !c.client_id.is_empty() && !c.client_secret.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    /// Plan name to Stripe price id.
    pub prices: HashMap<String, String>,
    pub webhook_tolerance_secs: i64,
}

impl BillingConfig {
    pub fn plan_for_price(&self, price_id: &str) -> Option<&str> {
        self.prices
            .iter()
            .find(|(_, id)| id.as_str() == price_id)
            .map(|(plan, _)| plan.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// "log" or "resend"
    pub provider: String,
    pub from: String,
    pub resend_api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }
        if let Ok(v) = env::var("UPLORA_IN_MEMORY") {
            let in_memory = v.parse().unwrap_or(false);
            self.database.in_memory = in_memory;
            self.storage.in_memory = in_memory;
        }

        // API overrides
        if let Some(port) = env::var("UPLORA_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_PUBLIC_URL") {
            self.api.public_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("APP_URL") {
            self.api.app_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("TOKEN_ENCRYPTION_SECRET") {
            self.security.token_encryption_secret = v;
        }

        // Storage overrides
        if let Ok(v) = env::var("S3_BUCKET") {
            self.storage.bucket = v;
        }
        if let Ok(v) = env::var("AWS_REGION") {
            self.storage.region = v;
        }
        if let Ok(v) = env::var("S3_ENDPOINT") {
            self.storage.endpoint = Some(v);
        }
        if let Ok(v) = env::var("STORAGE_DELETE_ATTEMPTS") {
            self.storage.delete_attempts = v.parse().unwrap_or(self.storage.delete_attempts);
        }

        // Provider credentials. Facebook and Instagram share one Meta app.
        let providers = [
            (Platform::Youtube, "YOUTUBE"),
            (Platform::Facebook, "META"),
            (Platform::Instagram, "META"),
            (Platform::X, "X"),
            (Platform::Tiktok, "TIKTOK"),
            (Platform::Pinterest, "PINTEREST"),
        ];
        for (platform, prefix) in providers {
            let id = env::var(format!("{}_CLIENT_ID", prefix));
            let secret = env::var(format!("{}_CLIENT_SECRET", prefix));
            if let (Ok(client_id), Ok(client_secret)) = (id, secret) {
                self.integrations.credentials.insert(
                    platform,
                    ProviderCredentials {
                        client_id,
                        client_secret,
                    },
                );
            }
        }

        // Billing overrides
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.billing.stripe_secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.billing.stripe_webhook_secret = v;
        }
        for plan in ["starter", "pro", "agency"] {
            if let Ok(price) = env::var(format!("STRIPE_PRICE_{}", plan.to_uppercase())) {
                self.billing.prices.insert(plan.to_string(), price);
            }
        }

        // Mail overrides
        if let Ok(v) = env::var("MAIL_PROVIDER") {
            self.mail.provider = v;
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            self.mail.from = v;
        }
        if let Ok(v) = env::var("RESEND_API_KEY") {
            self.mail.resend_api_key = v;
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
                in_memory: false,
            },
            api: ApiConfig {
                port: 3000,
                public_url: "http://localhost:3000".to_string(),
                app_url: "http://localhost:5173".to_string(),
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-jwt-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                token_encryption_secret: "development-token-encryption-secret".to_string(),
                oauth_state_ttl_minutes: 10,
            },
            storage: StorageConfig {
                bucket: "uplora-dev".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                in_memory: false,
                upload_url_ttl_secs: 15 * 60,
                download_url_ttl_secs: 60 * 60,
                delete_batch_size: 1000,
                delete_attempts: 3,
                delete_backoff_ms: 200,
            },
            integrations: IntegrationsConfig {
                credentials: HashMap::new(),
                refresh_skew_secs: 5 * 60,
            },
            billing: BillingConfig {
                stripe_secret_key: String::new(),
                stripe_webhook_secret: String::new(),
                prices: HashMap::new(),
                webhook_tolerance_secs: 5 * 60,
            },
            mail: MailConfig {
                provider: "log".to_string(),
                from: "Uplora <no-reply@localhost>".to_string(),
                resend_api_key: String::new(),
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.api.public_url = "https://api.staging.uplora.io".to_string();
        config.api.app_url = "https://staging.uplora.io".to_string();
        config.security.cors_origins = vec!["https://staging.uplora.io".to_string()];
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config.security.token_encryption_secret = String::new();
        config.storage.bucket = "uplora-staging".to_string();
        config.mail.provider = "resend".to_string();
        config.mail.from = "Uplora <no-reply@staging.uplora.io>".to_string();
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.database.run_migrations = false;
        config.api.public_url = "https://api.uplora.io".to_string();
        config.api.app_url = "https://uplora.io".to_string();
        config.api.enable_request_logging = false;
        config.security.cors_origins = vec!["https://uplora.io".to_string()];
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 4;
        config.security.token_encryption_secret = String::new();
        config.storage.bucket = "uplora".to_string();
        config.mail.provider = "resend".to_string();
        config.mail.from = "Uplora <no-reply@uplora.io>".to_string();
        config
    }

    /// Reject configurations that cannot serve traffic safely.
    pub fn validate(&self) -> Result<(), String> {
        if self.environment != Environment::Development {
            if self.security.jwt_secret.is_empty() {
                return Err("JWT_SECRET must be set outside development".to_string());
            }
            if self.security.token_encryption_secret.is_empty() {
                return Err("TOKEN_ENCRYPTION_SECRET must be set outside development".to_string());
            }
        }
        if !self.database.in_memory && self.database.url.is_none() {
            return Err("DATABASE_URL must be set unless UPLORA_IN_MEMORY=true".to_string());
        }
        Ok(())
    }

    /// OAuth redirect URI registered with each provider.
    pub fn oauth_redirect_uri(&self, platform: Platform) -> String {
        format!("{}/api/integrations/{}/callback", self.api.public_url, platform)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.storage.delete_attempts, 3);
        assert_eq!(config.storage.delete_batch_size, 1000);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.database.run_migrations);
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.mail.provider, "resend");
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::production();
        config.database.url = Some("postgres://localhost/uplora".to_string());
        assert!(config.validate().is_err());

        config.security.jwt_secret = "s".to_string();
        config.security.token_encryption_secret = "k".to_string();
        assert!(config.validate().is_ok());

        let mut dev = AppConfig::development();
        assert!(dev.validate().is_err());
        dev.database.in_memory = true;
        assert!(dev.validate().is_ok());
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let mut config = AppConfig::development();
        config.integrations.credentials.insert(
            Platform::X,
            ProviderCredentials {
                client_id: "id".to_string(),
                client_secret: String::new(),
            },
        );
        assert!(config.integrations.credentials(Platform::X).is_none());
        assert!(config.integrations.credentials(Platform::Youtube).is_none());
    }

    #[test]
    fn test_plan_for_price() {
        let mut config = AppConfig::development();
        config.billing.prices.insert("pro".to_string(), "price_123".to_string());
        assert_eq!(config.billing.plan_for_price("price_123"), Some("pro"));
        assert_eq!(config.billing.plan_for_price("price_999"), None);
    }

    #[test]
    fn test_redirect_uri() {
        let config = AppConfig::development();
        assert_eq!(
            config.oauth_redirect_uri(Platform::Tiktok),
            "http://localhost:3000/api/integrations/tiktok/callback"
        );
    }
}
