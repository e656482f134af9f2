use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use super::providers::{AccountInfo, ClientAuth, ProviderSpec, RefreshStyle};
use super::IntegrationError;
use crate::config::ProviderCredentials;
use crate::types::Platform;

/// What is being traded at the token endpoint
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
        verifier: Option<&'a str>,
    },
    RefreshToken(&'a str),
    /// Meta long-lived token exchange
    MetaExchange(&'a str),
}

/// A fully-formed request to a provider's token or revocation endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub method: Method,
    pub url: String,
    /// Query parameters for GET/DELETE, form body otherwise
    pub params: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
}

impl TokenRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

fn pair(k: &str, v: &str) -> (String, String) {
    (k.to_string(), v.to_string())
}

fn with_client_auth(provider: &ProviderSpec, creds: &ProviderCredentials, mut request: TokenRequest) -> TokenRequest {
    match provider.client_auth {
        ClientAuth::Basic => {
            request.basic_auth = Some((creds.client_id.clone(), creds.client_secret.clone()));
        }
        ClientAuth::Form => {
            request.params.push(pair(provider.client_id_param, &creds.client_id));
            request.params.push(pair("client_secret", &creds.client_secret));
        }
    }
    request
}

pub fn token_request(provider: &ProviderSpec, creds: &ProviderCredentials, grant: Grant<'_>) -> TokenRequest {
    let (method, params) = match grant {
        Grant::AuthorizationCode {
            code,
            redirect_uri,
            verifier,
        } => {
            let mut params = vec![
                pair("grant_type", "authorization_code"),
                pair("code", code),
                pair("redirect_uri", redirect_uri),
            ];
            if let Some(verifier) = verifier {
                params.push(pair("code_verifier", verifier));
            }
            let method = if provider.exchange_via_get { Method::GET } else { Method::POST };
            (method, params)
        }
        Grant::RefreshToken(token) => (
            Method::POST,
            vec![pair("grant_type", "refresh_token"), pair("refresh_token", token)],
        ),
        Grant::MetaExchange(token) => (
            Method::GET,
            vec![pair("grant_type", "fb_exchange_token"), pair("fb_exchange_token", token)],
        ),
    };

    with_client_auth(
        provider,
        creds,
        TokenRequest {
            method,
            url: provider.token_url.to_string(),
            params,
            basic_auth: None,
        },
    )
}

/// Revocation request for `access_token`, or `None` when the platform has
/// no revocation endpoint.
pub fn revoke_request(provider: &ProviderSpec, creds: &ProviderCredentials, access_token: &str) -> Option<TokenRequest> {
    let url = provider.revoke_url?.to_string();

    let request = match provider.refresh {
        // Meta revokes by deleting the app's permissions
        RefreshStyle::MetaExchange => TokenRequest {
            method: Method::DELETE,
            url,
            params: vec![pair("access_token", access_token)],
            basic_auth: None,
        },
        RefreshStyle::RefreshToken => {
            let mut params = vec![pair("token", access_token)];
            match provider.platform {
                Platform::Youtube => {
                    return Some(TokenRequest {
                        method: Method::POST,
                        url,
                        params,
                        basic_auth: None,
                    })
                }
                Platform::X => params.push(pair("token_type_hint", "access_token")),
                _ => {}
            }
            with_client_auth(
                provider,
                creds,
                TokenRequest {
                    method: Method::POST,
                    url,
                    params,
                    basic_auth: None,
                },
            )
        }
    };
    Some(request)
}

/// Parsed token endpoint response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    /// Account id some providers return with the token (TikTok `open_id`)
    pub account_id: Option<String>,
}

/// Pull a human-readable message out of a provider error body.
pub fn provider_message(body: &Value) -> Option<String> {
    match body.get("error") {
        // TikTok answers `{"error": {"code": "ok"}}` on success
        Some(Value::Object(err)) if err.get("code").and_then(Value::as_str) != Some("ok") => err
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(String::from),
        Some(Value::Object(_)) => None,
        Some(Value::String(code)) if !code.is_empty() => Some(
            body.get("error_description")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(|d| format!("{}: {}", code, d))
                .unwrap_or_else(|| code.clone()),
        ),
        _ => body
            .get("message")
            .and_then(Value::as_str)
            .map(String::from),
    }
}

impl TokenResponse {
    pub fn from_json(platform: Platform, body: &Value) -> Result<Self, IntegrationError> {
        if let Some(message) = body.get("error").and(provider_message(body)) {
            return Err(IntegrationError::provider(platform, message));
        }

        let access_token = body["access_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IntegrationError::provider(platform, "missing access_token in token response"))?
            .to_string();

        let expires_in = body["expires_in"]
            .as_i64()
            .or_else(|| body["expires_in"].as_str().and_then(|s| s.parse().ok()));

        Ok(Self {
            access_token,
            refresh_token: body["refresh_token"].as_str().filter(|t| !t.is_empty()).map(String::from),
            expires_in,
            scope: body["scope"].as_str().map(String::from),
            account_id: body["open_id"].as_str().map(String::from),
        })
    }

    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| now + Duration::seconds(secs))
    }
}

/// HTTP seam towards provider OAuth endpoints.
#[async_trait]
pub trait TokenClient: Send + Sync + 'static {
    async fn request_token(&self, provider: &ProviderSpec, request: TokenRequest) -> Result<TokenResponse, IntegrationError>;

    /// Identity of the account behind `access_token`, if the provider exposes one.
    async fn fetch_account(&self, provider: &ProviderSpec, access_token: &str) -> Result<Option<AccountInfo>, IntegrationError>;

    async fn revoke(&self, provider: &ProviderSpec, request: TokenRequest) -> Result<(), IntegrationError>;
}

/// `TokenClient` backed by reqwest
#[derive(Clone, Default)]
pub struct HttpTokenClient {
    http: reqwest::Client,
}

impl HttpTokenClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send(&self, platform: Platform, request: &TokenRequest) -> Result<Value, IntegrationError> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        builder = if request.method == Method::POST {
            builder.form(&request.params)
        } else {
            builder.query(&request.params)
        };
        if let Some((id, secret)) = &request.basic_auth {
            builder = builder.basic_auth(id, Some(secret));
        }

        let response = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| IntegrationError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IntegrationError::Transport(e.to_string()))?;
        debug!("{} {} -> {}", request.method, request.url, status);

        // Revocation endpoints may answer with an empty body
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            let message = provider_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
            return Err(IntegrationError::provider(platform, message));
        }
        Ok(body)
    }
}

#[async_trait]
impl TokenClient for HttpTokenClient {
    async fn request_token(&self, provider: &ProviderSpec, request: TokenRequest) -> Result<TokenResponse, IntegrationError> {
        let body = self.send(provider.platform, &request).await?;
        TokenResponse::from_json(provider.platform, &body)
    }

    async fn fetch_account(&self, provider: &ProviderSpec, access_token: &str) -> Result<Option<AccountInfo>, IntegrationError> {
        let Some(url) = provider.profile_url else {
            return Ok(None);
        };

        let mut builder = self.http.get(url);
        builder = match provider.refresh {
            RefreshStyle::MetaExchange => builder.query(&[("access_token", access_token)]),
            RefreshStyle::RefreshToken => builder.bearer_auth(access_token),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| IntegrationError::Transport(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| IntegrationError::provider(provider.platform, format!("unreadable profile: {}", e)))?;

        if !status.is_success() {
            let message = provider_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
            return Err(IntegrationError::provider(provider.platform, message));
        }
        Ok((provider.map_account)(&body))
    }

    async fn revoke(&self, provider: &ProviderSpec, request: TokenRequest) -> Result<(), IntegrationError> {
        self.send(provider.platform, &request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::provider;
    use serde_json::json;

    fn creds() -> ProviderCredentials {
        ProviderCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[test]
    fn x_uses_basic_auth_and_pkce() {
        let request = token_request(
            provider(Platform::X),
            &creds(),
            Grant::AuthorizationCode {
                code: "c",
                redirect_uri: "https://api/cb",
                verifier: Some("v"),
            },
        );
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.basic_auth, Some(("id".to_string(), "secret".to_string())));
        assert_eq!(request.param("code_verifier"), Some("v"));
        assert_eq!(request.param("client_secret"), None);
    }

    #[test]
    fn tiktok_sends_client_key() {
        let request = token_request(provider(Platform::Tiktok), &creds(), Grant::RefreshToken("r"));
        assert_eq!(request.param("client_key"), Some("id"));
        assert_eq!(request.param("client_id"), None);
        assert_eq!(request.param("grant_type"), Some("refresh_token"));
        assert!(request.basic_auth.is_none());
    }

    #[test]
    fn meta_exchanges_via_get() {
        let facebook = provider(Platform::Facebook);
        let code = token_request(
            facebook,
            &creds(),
            Grant::AuthorizationCode {
                code: "c",
                redirect_uri: "https://api/cb",
                verifier: None,
            },
        );
        assert_eq!(code.method, Method::GET);

        let exchange = token_request(facebook, &creds(), Grant::MetaExchange("long"));
        assert_eq!(exchange.method, Method::GET);
        assert_eq!(exchange.param("grant_type"), Some("fb_exchange_token"));
        assert_eq!(exchange.param("fb_exchange_token"), Some("long"));
    }

    #[test]
    fn revoke_requests_per_platform() {
        assert!(revoke_request(provider(Platform::Pinterest), &creds(), "t").is_none());

        let google = revoke_request(provider(Platform::Youtube), &creds(), "t").unwrap();
        assert_eq!(google.params, vec![pair("token", "t")]);

        let meta = revoke_request(provider(Platform::Instagram), &creds(), "t").unwrap();
        assert_eq!(meta.method, Method::DELETE);

        let tiktok = revoke_request(provider(Platform::Tiktok), &creds(), "t").unwrap();
        assert_eq!(tiktok.param("client_key"), Some("id"));
    }

    #[test]
    fn parses_token_response() {
        let body = json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": "3600",
            "scope": "tweet.read users.read",
            "open_id": "oid"
        });
        let parsed = TokenResponse::from_json(Platform::Tiktok, &body).unwrap();
        assert_eq!(parsed.access_token, "a");
        assert_eq!(parsed.expires_in, Some(3600));
        assert_eq!(parsed.account_id.as_deref(), Some("oid"));
    }

    #[test]
    fn provider_errors_surface_their_message() {
        let oauth = json!({"error": "invalid_grant", "error_description": "code expired"});
        let err = TokenResponse::from_json(Platform::X, &oauth).unwrap_err();
        assert!(err.to_string().contains("code expired"));

        let graph = json!({"error": {"message": "Invalid verification code", "type": "OAuthException"}});
        assert_eq!(provider_message(&graph).as_deref(), Some("Invalid verification code"));

        let missing = TokenResponse::from_json(Platform::X, &json!({}));
        assert!(matches!(missing, Err(IntegrationError::Provider { .. })));
    }
}
