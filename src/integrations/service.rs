use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::encryption::TokenCipher;
use super::oauth::{revoke_request, token_request, Grant, TokenClient};
use super::providers::{provider, ProviderSpec, RefreshStyle};
use super::state::{generate_pkce, sign_state, verify_state, OAuthState};
use super::IntegrationError;
use crate::config::{AppConfig, ProviderCredentials};
use crate::database::models::{Connection, NewConnection, TokenSet};
use crate::database::Store;
use crate::types::Platform;

/// Token lifecycle for team platform connections. Tokens are encrypted
/// before they reach the store and decrypted only when handed to a caller.
pub struct IntegrationService {
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    client: Arc<dyn TokenClient>,
    cipher: TokenCipher,
}

impl IntegrationService {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn Store>, client: Arc<dyn TokenClient>) -> Self {
        let cipher = TokenCipher::new(&config.security.token_encryption_secret);
        Self {
            config,
            store,
            client,
            cipher,
        }
    }

    fn credentials(&self, platform: Platform) -> Result<&ProviderCredentials, IntegrationError> {
        self.config
            .integrations
            .credentials(platform)
            .ok_or(IntegrationError::NotConfigured(platform))
    }

    /// Provider consent URL for connecting `platform` to `team_id`.
    pub fn authorization_url(&self, team_id: Uuid, user_id: Uuid, platform: Platform) -> Result<String, IntegrationError> {
        let spec = provider(platform);
        let creds = self.credentials(platform)?;

        let (sealed_verifier, challenge) = if spec.pkce {
            let (verifier, challenge) = generate_pkce();
            (Some(self.cipher.encrypt(&verifier)?), Some(challenge))
        } else {
            (None, None)
        };

        let state = sign_state(
            team_id,
            user_id,
            platform,
            sealed_verifier,
            &self.config.security.jwt_secret,
            self.config.security.oauth_state_ttl_minutes,
        )?;

        let mut url = Url::parse(spec.auth_url).map_err(|e| IntegrationError::provider(platform, e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(spec.client_id_param, &creds.client_id)
                .append_pair("redirect_uri", &self.config.oauth_redirect_uri(platform))
                .append_pair("response_type", "code")
                .append_pair("scope", &spec.scope_string())
                .append_pair("state", &state);
            if let Some(challenge) = &challenge {
                query
                    .append_pair("code_challenge", challenge)
                    .append_pair("code_challenge_method", "S256");
            }
            for (key, value) in spec.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        Ok(url.to_string())
    }

    /// Check a callback's `state` without touching the provider.
    pub fn verify_state(&self, platform: Platform, state: &str) -> Result<OAuthState, IntegrationError> {
        verify_state(state, platform, &self.config.security.jwt_secret)
    }

    /// Finish the authorization code flow and store the connection.
    pub async fn complete(&self, state: &OAuthState, code: &str) -> Result<Connection, IntegrationError> {
        let platform = state.platform;
        let spec = provider(platform);
        let creds = self.credentials(platform)?;
        let redirect_uri = self.config.oauth_redirect_uri(platform);
        let verifier = state
            .sealed_verifier
            .as_deref()
            .map(|sealed| self.cipher.decrypt(sealed))
            .transpose()
            .map_err(|_| IntegrationError::InvalidState("unreadable PKCE verifier".to_string()))?;

        let request = token_request(
            spec,
            creds,
            Grant::AuthorizationCode {
                code,
                redirect_uri: &redirect_uri,
                verifier: verifier.as_deref(),
            },
        );
        let mut response = self.client.request_token(spec, request).await?;

        // Meta hands out a short-lived token first; trade it for a long-lived one
        if spec.refresh == RefreshStyle::MetaExchange {
            let exchange = token_request(spec, creds, Grant::MetaExchange(&response.access_token));
            response = self.client.request_token(spec, exchange).await?;
        }

        let account = match self.client.fetch_account(spec, &response.access_token).await {
            Ok(account) => account,
            Err(e) => {
                warn!("Could not read {} account identity: {}", platform, e);
                None
            }
        };

        let tokens = TokenSet {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: response.expires_at(Utc::now()),
            scopes: response
                .scope
                .as_deref()
                .map(|s| spec.parse_scopes(s))
                .unwrap_or_else(|| spec.scopes.iter().map(|s| s.to_string()).collect()),
        };

        let connection = self
            .store
            .save_connection(NewConnection {
                team_id: state.team_id,
                platform,
                account_id: account.as_ref().map(|a| a.id.clone()).or(response.account_id),
                account_name: account.and_then(|a| a.name),
                tokens: self.cipher.seal(&tokens)?,
                connected_by: state.user_id,
            })
            .await?;

        info!("Connected {} for team {}", platform, state.team_id);
        Ok(connection)
    }

    async fn connection(&self, team_id: Uuid, platform: Platform) -> Result<Connection, IntegrationError> {
        self.store
            .get_connection(team_id, platform)
            .await?
            .ok_or(IntegrationError::NotConnected(platform))
    }

    /// Decrypted access token, refreshed first when it expires within the
    /// configured skew.
    pub async fn access_token(&self, team_id: Uuid, platform: Platform) -> Result<String, IntegrationError> {
        let mut connection = self.connection(team_id, platform).await?;

        let skew = Duration::seconds(self.config.integrations.refresh_skew_secs);
        let expiring = connection
            .expires_at
            .map(|at| at <= Utc::now() + skew)
            .unwrap_or(false);
        if expiring {
            connection = self.refresh_connection(&connection).await?;
        }

        self.cipher.decrypt(&connection.access_token)
    }

    pub async fn refresh(&self, team_id: Uuid, platform: Platform) -> Result<Connection, IntegrationError> {
        let connection = self.connection(team_id, platform).await?;
        self.refresh_connection(&connection).await
    }

    async fn refresh_connection(&self, connection: &Connection) -> Result<Connection, IntegrationError> {
        let platform = connection.platform;
        let spec = provider(platform);
        let creds = self.credentials(platform)?;
        let current = self.cipher.open(&connection.tokens())?;

        let request = match spec.refresh {
            RefreshStyle::RefreshToken => {
                let refresh_token = current
                    .refresh_token
                    .as_deref()
                    .ok_or(IntegrationError::ReconnectRequired(platform))?;
                token_request(spec, creds, Grant::RefreshToken(refresh_token))
            }
            RefreshStyle::MetaExchange => token_request(spec, creds, Grant::MetaExchange(&current.access_token)),
        };

        let response = self.client.request_token(spec, request).await?;
        let renewed = TokenSet {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone().or(current.refresh_token),
            expires_at: response.expires_at(Utc::now()),
            scopes: response
                .scope
                .as_deref()
                .map(|s| spec.parse_scopes(s))
                .unwrap_or(current.scopes),
        };

        let updated = self
            .store
            .update_connection_tokens(connection.id, &self.cipher.seal(&renewed)?)
            .await?;
        info!("Refreshed {} token for team {}", platform, connection.team_id);
        Ok(updated)
    }

    /// Revoke at the provider, then delete the connection.
    pub async fn disconnect(&self, team_id: Uuid, platform: Platform) -> Result<Option<String>, IntegrationError> {
        let connection = self.connection(team_id, platform).await?;
        let warning = self.revoke_connection(&connection).await;
        self.store.delete_connection(team_id, platform).await?;
        info!("Disconnected {} for team {}", platform, team_id);
        Ok(warning)
    }

    /// Best-effort revocation. Returns a warning instead of failing.
    pub async fn revoke_connection(&self, connection: &Connection) -> Option<String> {
        let platform = connection.platform;
        let result = self.try_revoke(provider(platform), connection).await;
        match result {
            Ok(()) => None,
            Err(e) => {
                warn!("Could not revoke {} token for team {}: {}", platform, connection.team_id, e);
                Some(format!("Could not revoke {} access: {}", platform, e))
            }
        }
    }

    async fn try_revoke(&self, spec: &ProviderSpec, connection: &Connection) -> Result<(), IntegrationError> {
        let creds = self.credentials(spec.platform)?;
        let access_token = self.cipher.decrypt(&connection.access_token)?;
        match revoke_request(spec, creds, &access_token) {
            Some(request) => self.client.revoke(spec, request).await,
            None => Ok(()),
        }
    }

    /// Revoke every connection, collecting warnings.
    pub async fn revoke_all(&self, connections: &[Connection]) -> Vec<String> {
        let mut warnings = Vec::new();
        for connection in connections {
            warnings.extend(self.revoke_connection(connection).await);
        }
        warnings
    }
}
