//! Object storage for uploaded media.
//!
//! Every object lives under `teams/{team_id}/{kind}/`, so a team's media can
//! be removed with one prefix sweep.

pub mod cleanup;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::types::ContentKind;

pub use cleanup::{CleanupReport, ObjectCleaner};
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("presign failed: {0}")]
    Presign(String),

    #[error("storage request failed: {0}")]
    Request(String),
}

/// An object's body as it comes off the backend, chunk by chunk.
pub struct ObjectBody {
    pub content_length: u64,
    pub stream: BoxStream<'static, Result<Bytes, StorageError>>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// URL a client can PUT the object body to until `ttl` elapses.
    async fn presign_put(&self, key: &str, content_type: &str, ttl: Duration) -> Result<String, StorageError>;

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    async fn open(&self, key: &str) -> Result<ObjectBody, StorageError>;

    /// Every key under `prefix`, across all result pages.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Delete up to one batch of keys. Returns the keys the backend reported
    /// as not deleted; `Err` means the whole request failed.
    async fn delete_batch(&self, keys: &[String]) -> Result<Vec<String>, StorageError>;
}

pub fn team_prefix(team_id: Uuid) -> String {
    format!("teams/{}/", team_id)
}

pub fn kind_prefix(team_id: Uuid, kind: ContentKind) -> String {
    format!("teams/{}/{}/", team_id, kind)
}

/// Reduce a client-supplied filename to `[A-Za-z0-9._-]`, at most 100 chars.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    let trimmed: String = out.trim_matches(|c| c == '-' || c == '.').chars().take(100).collect();
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed
    }
}

/// Fresh key for a new upload: `teams/{team}/{kind}/{uuid}-{filename}`.
pub fn upload_key(team_id: Uuid, kind: ContentKind, filename: &str) -> String {
    format!("{}{}-{}", kind_prefix(team_id, kind), Uuid::new_v4(), sanitize_filename(filename))
}

/// Check that `key` names an object inside the team's folder for `kind`.
pub fn validate_key(team_id: Uuid, kind: ContentKind, key: &str) -> Result<(), StorageError> {
    let prefix = kind_prefix(team_id, kind);
    let rest = key
        .strip_prefix(&prefix)
        .ok_or_else(|| StorageError::InvalidKey(format!("'{}' is outside {}", key, prefix)))?;

    if rest.is_empty() || rest.split('/').any(|part| part.is_empty() || part == "..") {
        return Err(StorageError::InvalidKey(format!("'{}' is not a valid object name", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename("My Holiday Video!!.mp4"), "My-Holiday-Video-.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\clips\\a b.mov"), "a-b.mov");
        assert_eq!(sanitize_filename("???"), "file");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), 100);
    }

    #[test]
    fn upload_keys_sit_under_kind_prefix() {
        let team = Uuid::new_v4();
        let key = upload_key(team, ContentKind::Video, "clip.mp4");
        assert!(key.starts_with(&format!("teams/{}/video/", team)));
        assert!(key.ends_with("-clip.mp4"));
        assert!(validate_key(team, ContentKind::Video, &key).is_ok());
    }

    #[test]
    fn rejects_foreign_keys() {
        let team = Uuid::new_v4();
        let other = Uuid::new_v4();

        let foreign = format!("teams/{}/image/a.png", other);
        assert!(validate_key(team, ContentKind::Image, &foreign).is_err());

        let wrong_kind = format!("teams/{}/video/a.png", team);
        assert!(validate_key(team, ContentKind::Image, &wrong_kind).is_err());

        let traversal = format!("teams/{}/image/../../{}/image/a.png", team, other);
        assert!(validate_key(team, ContentKind::Image, &traversal).is_err());

        let bare = format!("teams/{}/image/", team);
        assert!(validate_key(team, ContentKind::Image, &bare).is_err());
    }
}
