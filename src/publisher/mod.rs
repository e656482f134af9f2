//! Dispatch of approved content to external platforms.

pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;
use crate::types::{ContentKind, Platform};

pub use http::HttpPublisher;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Provider(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One stored media object, addressable by key and by a short-lived URL
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub key: String,
    pub url: String,
}

/// Everything a platform needs to create one post
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub platform: Platform,
    pub access_token: String,
    /// Page, channel or business account the connection points at
    pub account_id: Option<String>,
    pub kind: ContentKind,
    pub title: Option<String>,
    pub text: String,
    pub media: Vec<MediaRef>,
    pub thumbnail: Option<MediaRef>,
}

impl PublishRequest {
    /// Title for platforms that require one.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                let first_line = self.text.lines().next().unwrap_or("").trim();
                if first_line.is_empty() {
                    "Untitled".to_string()
                } else {
                    first_line.chars().take(100).collect()
                }
            })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublishReceipt {
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError>;
}
