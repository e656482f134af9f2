//! Signed OAuth `state` parameter and PKCE helpers.
//!
//! The state is an HS256 JWT, so the callback needs no server-side session.
//! It travels back through the browser next to the authorization code, so
//! the PKCE verifier inside it is encrypted, never plain.

use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::IntegrationError;
use crate::types::Platform;

const STATE_AUDIENCE: &str = "oauth-state";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    /// PKCE verifier encrypted with the token cipher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_verifier: Option<String>,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn sign_state(
    team_id: Uuid,
    user_id: Uuid,
    platform: Platform,
    sealed_verifier: Option<String>,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, IntegrationError> {
    let now = Utc::now();
    let claims = OAuthState {
        team_id,
        user_id,
        platform,
        sealed_verifier,
        aud: STATE_AUDIENCE.to_string(),
        exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
        iat: now.timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| IntegrationError::InvalidState(format!("could not sign state: {}", e)))
}

/// Check signature, expiry and audience, and that the callback arrived on
/// the platform the flow was started for.
pub fn verify_state(token: &str, platform: Platform, secret: &str) -> Result<OAuthState, IntegrationError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation.set_audience(&[STATE_AUDIENCE]);

    let state = decode::<OAuthState>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| IntegrationError::InvalidState(e.to_string()))?
        .claims;

    if state.platform != platform {
        return Err(IntegrationError::InvalidState(format!(
            "state was issued for {}, not {}",
            state.platform, platform
        )));
    }
    Ok(state)
}

/// `(verifier, S256 challenge)`
pub fn generate_pkce() -> (String, String) {
    let verifier: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    let challenge = pkce_challenge(&verifier);
    (verifier, challenge)
}

pub fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trip() {
        let team = Uuid::new_v4();
        let user = Uuid::new_v4();
        let token = sign_state(team, user, Platform::X, Some("v".to_string()), "s", 10).unwrap();

        let state = verify_state(&token, Platform::X, "s").unwrap();
        assert_eq!(state.team_id, team);
        assert_eq!(state.user_id, user);
        assert_eq!(state.sealed_verifier.as_deref(), Some("v"));
    }

    #[test]
    fn platform_mismatch_is_rejected() {
        let token = sign_state(Uuid::new_v4(), Uuid::new_v4(), Platform::X, None, "s", 10).unwrap();
        assert!(matches!(
            verify_state(&token, Platform::Tiktok, "s"),
            Err(IntegrationError::InvalidState(_))
        ));
    }

    #[test]
    fn expired_or_forged_state_is_rejected() {
        let expired = sign_state(Uuid::new_v4(), Uuid::new_v4(), Platform::X, None, "s", -1).unwrap();
        assert!(verify_state(&expired, Platform::X, "s").is_err());

        let forged = sign_state(Uuid::new_v4(), Uuid::new_v4(), Platform::X, None, "other", 10).unwrap();
        assert!(verify_state(&forged, Platform::X, "s").is_err());
    }

    #[test]
    fn identity_tokens_are_not_states() {
        let claims = crate::auth::Claims::new(Uuid::new_v4(), "a@example.com", None, 1);
        let token = crate::auth::generate_jwt(&claims, "s").unwrap();
        assert!(verify_state(&token, Platform::X, "s").is_err());
    }

    #[test]
    fn pkce_matches_rfc_example() {
        // RFC 7636 appendix B
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-1mB0Unj6_gHuK8ws1I7-l5PqZ5uAlI"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URXbwJrbW-vYpE"
        );
        let (verifier, challenge) = generate_pkce();
        assert_eq!(verifier.len(), 64);
        assert_eq!(challenge, pkce_challenge(&verifier));
    }
}
