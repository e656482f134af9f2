//! AES-256-GCM encryption for stored OAuth tokens.
//!
//! Ciphertexts are base64 of `nonce (12 bytes) || ciphertext`.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine;
use sha2::{Digest, Sha256};

use super::IntegrationError;
use crate::database::models::TokenSet;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct TokenCipher {
    key: Key<Aes256Gcm>,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher(..)")
    }
}

impl TokenCipher {
    /// Derive a 256-bit key from the configured secret using SHA-256.
    pub fn new(secret: &str) -> Self {
        let hash = Sha256::digest(secret.as_bytes());
        Self {
            key: *Key::<Aes256Gcm>::from_slice(&hash),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, IntegrationError> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| IntegrationError::Crypto(format!("encryption failed: {}", e)))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, IntegrationError> {
        let cipher = Aes256Gcm::new(&self.key);

        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|e| IntegrationError::Crypto(format!("base64 error: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(IntegrationError::Crypto("ciphertext too short (missing nonce)".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| IntegrationError::Crypto(format!("decryption failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| IntegrationError::Crypto(format!("not valid UTF-8: {}", e)))
    }

    /// Encrypt the secret parts of a token set for storage.
    pub fn seal(&self, tokens: &TokenSet) -> Result<TokenSet, IntegrationError> {
        Ok(TokenSet {
            access_token: self.encrypt(&tokens.access_token)?,
            refresh_token: tokens.refresh_token.as_deref().map(|t| self.encrypt(t)).transpose()?,
            expires_at: tokens.expires_at,
            scopes: tokens.scopes.clone(),
        })
    }

    pub fn open(&self, tokens: &TokenSet) -> Result<TokenSet, IntegrationError> {
        Ok(TokenSet {
            access_token: self.decrypt(&tokens.access_token)?,
            refresh_token: tokens.refresh_token.as_deref().map(|t| self.decrypt(t)).transpose()?,
            expires_at: tokens.expires_at,
            scopes: tokens.scopes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = TokenCipher::new("a]vt!MFX8H-e!4igKa5)Tu.{ec:2$z%n");
        let plaintext = "ya29.a0AfH6SMBx-some-access-token";

        let encrypted = cipher.encrypt(plaintext).unwrap();
        assert_ne!(encrypted, plaintext);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn nonces_differ_per_call() {
        let cipher = TokenCipher::new("secret");
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let encrypted = TokenCipher::new("one").encrypt("token").unwrap();
        assert!(matches!(
            TokenCipher::new("two").decrypt(&encrypted),
            Err(IntegrationError::Crypto(_))
        ));
    }

    #[test]
    fn short_input_fails() {
        let cipher = TokenCipher::new("secret");
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 4]);
        assert!(cipher.decrypt(&short).is_err());
    }

    #[test]
    fn seals_optional_refresh_token() {
        let cipher = TokenCipher::new("secret");
        let tokens = TokenSet {
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: None,
            scopes: vec!["a".to_string()],
        };

        let sealed = cipher.seal(&tokens).unwrap();
        assert!(sealed.refresh_token.is_none());
        assert_ne!(sealed.access_token, "access");
        assert_eq!(cipher.open(&sealed).unwrap(), tokens);
    }
}
