//! OAuth connections to publishing platforms: authorization, code exchange,
//! refresh, encrypted storage and revocation.

pub mod encryption;
pub mod oauth;
pub mod providers;
pub mod service;
pub mod state;

use thiserror::Error;

use crate::database::StoreError;
use crate::types::Platform;

pub use encryption::TokenCipher;
pub use oauth::{HttpTokenClient, TokenClient, TokenResponse};
pub use providers::{provider, AccountInfo, ProviderSpec};
pub use service::IntegrationService;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0} integration is not configured")]
    NotConfigured(Platform),

    #[error("{0} is not connected")]
    NotConnected(Platform),

    #[error("invalid OAuth state: {0}")]
    InvalidState(String),

    #[error("{0} connection must be re-authorized")]
    ReconnectRequired(Platform),

    #[error("{platform} error: {message}")]
    Provider { platform: Platform, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("token encryption error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntegrationError {
    pub fn provider(platform: Platform, message: impl Into<String>) -> Self {
        IntegrationError::Provider {
            platform,
            message: message.into(),
        }
    }
}
