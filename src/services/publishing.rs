use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::content::{actor, load_post};
use crate::access::{check_content, ContentAction};
use crate::app::AppState;
use crate::database::models::Post;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::publisher::{MediaRef, PublishRequest};
use crate::types::{ContentKind, ContentStatus, Platform};

/// Outcome of publishing to one platform
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlatformResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            external_id: None,
            url: None,
            error: Some(error.into()),
        }
    }
}

async fn media_refs(state: &AppState, keys: &[String]) -> Result<Vec<MediaRef>, ApiError> {
    let ttl = Duration::from_secs(state.config.storage.download_url_ttl_secs);
    let mut refs = Vec::with_capacity(keys.len());
    for key in keys {
        refs.push(MediaRef {
            key: key.clone(),
            url: state.objects.presign_get(key, ttl).await?,
        });
    }
    Ok(refs)
}

async fn publish_to(
    state: &AppState,
    post: &Post,
    platform: Platform,
    media: &[MediaRef],
    thumbnail: Option<&MediaRef>,
) -> PlatformResult {
    let connection = match state.store.get_connection(post.team_id, platform).await {
        Ok(Some(connection)) => connection,
        Ok(None) => return PlatformResult::failed(format!("{} is not connected", platform)),
        Err(e) => return PlatformResult::failed(e.to_string()),
    };

    let access_token = match state.integrations.access_token(post.team_id, platform).await {
        Ok(token) => token,
        Err(e) => return PlatformResult::failed(e.to_string()),
    };

    let request = PublishRequest {
        platform,
        access_token,
        account_id: connection.account_id,
        kind: post.kind,
        title: post.title.clone(),
        text: post.body.clone(),
        media: media.to_vec(),
        thumbnail: thumbnail.cloned(),
    };

    match state.publisher.publish(&request).await {
        Ok(receipt) => PlatformResult {
            ok: true,
            external_id: Some(receipt.external_id),
            url: receipt.url,
            error: None,
        },
        Err(e) => PlatformResult::failed(e.to_string()),
    }
}

/// Dispatch a post to each of its target platforms concurrently. The post
/// becomes `PUBLISHED` when at least one platform accepted it.
pub async fn publish(state: &AppState, user: &AuthUser, team_id: Uuid, kind: ContentKind, id: Uuid) -> Result<Post, ApiError> {
    let (member, mut post) = load_post(state, user, team_id, kind, id).await?;
    check_content(actor(&member, &post), ContentAction::Publish, post.status)?;

    if post.platforms.is_empty() {
        return Err(ApiError::invalid_field("platforms", "Choose at least one platform to publish to"));
    }

    let media = media_refs(state, &post.media_keys).await?;
    let thumbnail = match &post.thumbnail_key {
        Some(key) => media_refs(state, std::slice::from_ref(key)).await?.pop(),
        None => None,
    };

    let outcomes = join_all(
        post.platforms
            .iter()
            .map(|platform| publish_to(state, &post, *platform, &media, thumbnail.as_ref())),
    )
    .await;

    let mut results = BTreeMap::new();
    for (platform, result) in post.platforms.iter().zip(outcomes) {
        if let Some(error) = &result.error {
            warn!("Publishing {} post {} to {} failed: {}", kind, id, platform, error);
        }
        results.insert(platform.as_str().to_string(), result);
    }

    let any_ok = results.values().any(|r| r.ok);
    post.publish_results = serde_json::to_value(&results)
        .map_err(|e| ApiError::internal_server_error(format!("Could not record results: {}", e)))?;
    if any_ok {
        post.status = ContentStatus::Published;
        post.published_at = Some(Utc::now());
    }
    let post = state.store.update_post(&post).await?;

    if !any_ok {
        return Err(ApiError::bad_gateway_with(
            "Publishing failed on every platform",
            post.publish_results.clone(),
        ));
    }

    info!(
        "{} published {} post {} ({} of {} platforms)",
        user.id,
        kind,
        id,
        results.values().filter(|r| r.ok).count(),
        results.len()
    );
    Ok(post)
}
