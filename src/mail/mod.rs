//! Outgoing email. Invitations are the only message the service sends.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;
use crate::types::Role;

const RESEND_API: &str = "https://api.resend.com/emails";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider is not configured: {0}")]
    NotConfigured(String),

    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl EmailMessage {
    pub fn invitation(to: &str, team_name: &str, inviter: &str, role: Role, accept_url: &str) -> Self {
        let role = role.as_str().to_lowercase();
        Self {
            to: to.to_string(),
            subject: format!("You're invited to join {} on Uplora", team_name),
            html: format!(
                "<p>{} invited you to join <strong>{}</strong> as {}.</p>\
                 <p><a href=\"{}\">Accept the invitation</a></p>\
                 <p>This invitation expires in 7 days.</p>",
                inviter, team_name, role, accept_url
            ),
            text: format!(
                "{} invited you to join {} as {}.\n\nAccept the invitation: {}\n\nThis invitation expires in 7 days.",
                inviter, team_name, role, accept_url
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!("[email] to={} subject={:?}\n{}", message.to, message.subject, message.text);
        Ok(())
    }
}

pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.api_key.is_empty() {
            return Err(MailError::NotConfigured("RESEND_API_KEY is not set".to_string()));
        }

        let response = self
            .http
            .post(RESEND_API)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [message.to],
                "subject": message.subject,
                "html": message.html,
                "text": message.text,
            }))
            .send()
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Delivery(format!("HTTP {}: {}", status, body)));
        }
        Ok(())
    }
}

/// Keeps every message in memory for inspection.
#[derive(Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|e| MailError::Delivery(e.to_string()))?
            .push(message.clone());
        Ok(())
    }
}

/// Mailer selected by `MAIL_PROVIDER`.
pub fn from_config(config: &MailConfig, http: reqwest::Client) -> Arc<dyn Mailer> {
    match config.provider.as_str() {
        "resend" => Arc::new(ResendMailer::new(http, &config.resend_api_key, &config.from)),
        _ => Arc::new(LogMailer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_mentions_team_role_and_link() {
        let message = EmailMessage::invitation(
            "new@example.com",
            "Acme",
            "Ada",
            Role::Manager,
            "https://app.test/invites/abc",
        );
        assert_eq!(message.to, "new@example.com");
        assert!(message.subject.contains("Acme"));
        assert!(message.text.contains("as manager"));
        assert!(message.html.contains("https://app.test/invites/abc"));
    }

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let mailer = MemoryMailer::new();
        let message = EmailMessage::invitation("a@b.com", "T", "U", Role::Editor, "u");
        mailer.send(&message).await.unwrap();
        assert_eq!(mailer.sent(), vec![message]);
    }

    #[tokio::test]
    async fn resend_without_key_is_not_configured() {
        let mailer = ResendMailer::new(reqwest::Client::new(), "", "from@x");
        let message = EmailMessage::invitation("a@b.com", "T", "U", Role::Editor, "u");
        assert!(matches!(mailer.send(&message).await, Err(MailError::NotConfigured(_))));
    }
}
