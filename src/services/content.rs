use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::require_member;
use crate::access::{approval_target, check_content, check_create, check_transition, Actor, ContentAction};
use crate::app::AppState;
use crate::database::models::{Member, NewPost, Post};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::storage::{upload_key, validate_key};
use crate::types::{ContentKind, ContentStatus, Platform};

const MAX_IMAGES: usize = 10;
const MAX_TITLE_CHARS: usize = 200;

/// Distinguishes an absent field from an explicit `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePost {
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
    pub status: Option<ContentStatus>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub media_keys: Vec<String>,
    pub thumbnail_key: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePost {
    #[serde(default, deserialize_with = "nullable")]
    pub title: Option<Option<String>>,
    pub body: Option<String>,
    pub status: Option<ContentStatus>,
    pub platforms: Option<Vec<Platform>>,
    pub media_keys: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub thumbnail_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

impl UpdatePost {
    fn changes_fields(&self) -> bool {
        self.title.is_some()
            || self.body.is_some()
            || self.platforms.is_some()
            || self.media_keys.is_some()
            || self.thumbnail_key.is_some()
            || self.scheduled_at.is_some()
    }
}

fn dedup_platforms(platforms: Vec<Platform>) -> Vec<Platform> {
    let mut out = Vec::with_capacity(platforms.len());
    for platform in platforms {
        if !out.contains(&platform) {
            out.push(platform);
        }
    }
    out
}

fn clean_title(title: Option<String>) -> Option<String> {
    title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Shape rules per content kind, and key placement under the team folder.
pub fn validate_post(
    team_id: Uuid,
    kind: ContentKind,
    title: Option<&str>,
    body: &str,
    media_keys: &[String],
    thumbnail_key: Option<&str>,
) -> Result<(), ApiError> {
    if title.map(|t| t.chars().count() > MAX_TITLE_CHARS).unwrap_or(false) {
        return Err(ApiError::invalid_field("title", "Title must be at most 200 characters"));
    }

    match kind {
        ContentKind::Text => {
            if body.trim().is_empty() {
                return Err(ApiError::invalid_field("body", "Text posts need a body"));
            }
            if !media_keys.is_empty() || thumbnail_key.is_some() {
                return Err(ApiError::invalid_field("media_keys", "Text posts cannot carry media"));
            }
        }
        ContentKind::Image => {
            if media_keys.is_empty() || media_keys.len() > MAX_IMAGES {
                return Err(ApiError::invalid_field("media_keys", "Image posts need between 1 and 10 images"));
            }
            if thumbnail_key.is_some() {
                return Err(ApiError::invalid_field("thumbnail_key", "Only reels and videos take a thumbnail"));
            }
        }
        ContentKind::Reel | ContentKind::Video => {
            if media_keys.len() != 1 {
                return Err(ApiError::invalid_field(
                    "media_keys",
                    format!("{} posts need exactly one media file", kind),
                ));
            }
        }
    }

    for key in media_keys {
        validate_key(team_id, kind, key).map_err(|e| ApiError::invalid_field("media_keys", e.to_string()))?;
    }
    if let Some(key) = thumbnail_key {
        validate_key(team_id, kind, key).map_err(|e| ApiError::invalid_field("thumbnail_key", e.to_string()))?;
    }
    Ok(())
}

fn require_schedule(status: ContentStatus, scheduled_at: Option<DateTime<Utc>>) -> Result<(), ApiError> {
    if status == ContentStatus::Scheduled && scheduled_at.is_none() {
        return Err(ApiError::invalid_field("scheduled_at", "Scheduled content needs a publish time"));
    }
    Ok(())
}

pub(crate) async fn load_post(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    id: Uuid,
) -> Result<(Member, Post), ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    let post = state
        .store
        .get_post(kind, team_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} post not found", kind)))?;
    Ok((member, post))
}

pub(crate) fn actor(member: &Member, post: &Post) -> Actor {
    Actor::new(member.role, post.user_id == member.user_id)
}

pub async fn create(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    input: CreatePost,
) -> Result<Post, ApiError> {
    let member = require_member(state.store.as_ref(), team_id, user.id).await?;
    let status = input.status.unwrap_or(ContentStatus::Draft);
    check_create(member.role, status)?;

    let title = clean_title(input.title);
    validate_post(
        team_id,
        kind,
        title.as_deref(),
        &input.body,
        &input.media_keys,
        input.thumbnail_key.as_deref(),
    )?;
    require_schedule(status, input.scheduled_at)?;

    let mut post = state
        .store
        .create_post(NewPost {
            team_id,
            user_id: user.id,
            kind,
            title,
            body: input.body,
            status,
            platforms: dedup_platforms(input.platforms),
            media_keys: input.media_keys,
            thumbnail_key: input.thumbnail_key,
            scheduled_at: input.scheduled_at,
        })
        .await?;

    // Privileged members may create content that is already approved
    if matches!(status, ContentStatus::Approved | ContentStatus::Scheduled) {
        post.approved_by = Some(user.id);
        post = state.store.update_post(&post).await?;
    }

    info!("{} created {} post {} in team {} as {}", user.id, kind, post.id, team_id, status);
    Ok(post)
}

pub async fn list(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    status: Option<ContentStatus>,
) -> Result<Vec<Post>, ApiError> {
    require_member(state.store.as_ref(), team_id, user.id).await?;
    Ok(state.store.list_posts(kind, team_id, status).await?)
}

pub async fn get(state: &AppState, user: &AuthUser, team_id: Uuid, kind: ContentKind, id: Uuid) -> Result<Post, ApiError> {
    let (member, post) = load_post(state, user, team_id, kind, id).await?;
    check_content(actor(&member, &post), ContentAction::View, post.status)?;
    Ok(post)
}

pub async fn update(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    id: Uuid,
    input: UpdatePost,
) -> Result<Post, ApiError> {
    let (member, mut post) = load_post(state, user, team_id, kind, id).await?;
    let actor = actor(&member, &post);
    let from = post.status;

    if input.changes_fields() || input.status.is_none() {
        check_content(actor, ContentAction::Edit, from)?;
    }
    if let Some(to) = input.status {
        check_transition(actor, from, to)?;
    }

    let changes_fields = input.changes_fields();
    if let Some(title) = input.title {
        post.title = clean_title(title);
    }
    if let Some(body) = input.body {
        post.body = body;
    }
    if let Some(platforms) = input.platforms {
        post.platforms = dedup_platforms(platforms);
    }
    if let Some(media_keys) = input.media_keys {
        post.media_keys = media_keys;
    }
    if let Some(thumbnail_key) = input.thumbnail_key {
        post.thumbnail_key = thumbnail_key;
    }
    if let Some(scheduled_at) = input.scheduled_at {
        post.scheduled_at = scheduled_at;
    }

    if changes_fields {
        validate_post(
            team_id,
            kind,
            post.title.as_deref(),
            &post.body,
            &post.media_keys,
            post.thumbnail_key.as_deref(),
        )?;
    }

    if let Some(to) = input.status {
        match to {
            ContentStatus::Approved | ContentStatus::Scheduled if from != to => post.approved_by = Some(user.id),
            ContentStatus::Draft | ContentStatus::Pending => post.approved_by = None,
            _ => {}
        }
        post.status = to;
    }
    require_schedule(post.status, post.scheduled_at)?;

    let updated = state.store.update_post(&post).await?;
    if updated.status != from {
        info!("{} moved {} post {} from {} to {}", user.id, kind, id, from, updated.status);
    }
    Ok(updated)
}

pub async fn submit(state: &AppState, user: &AuthUser, team_id: Uuid, kind: ContentKind, id: Uuid) -> Result<Post, ApiError> {
    let (member, mut post) = load_post(state, user, team_id, kind, id).await?;
    check_content(actor(&member, &post), ContentAction::Submit, post.status)?;

    post.status = ContentStatus::Pending;
    post.review_note = None;
    let post = state.store.update_post(&post).await?;
    info!("{} submitted {} post {} for review", user.id, kind, id);
    Ok(post)
}

pub async fn approve(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    id: Uuid,
    note: Option<String>,
) -> Result<Post, ApiError> {
    let (member, mut post) = load_post(state, user, team_id, kind, id).await?;
    check_content(actor(&member, &post), ContentAction::Approve, post.status)?;

    post.status = approval_target(post.scheduled_at.is_some());
    post.approved_by = Some(user.id);
    post.review_note = clean_title(note);
    let post = state.store.update_post(&post).await?;
    info!("{} approved {} post {} as {}", user.id, kind, id, post.status);
    Ok(post)
}

pub async fn reject(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    id: Uuid,
    reason: Option<String>,
) -> Result<Post, ApiError> {
    let (member, mut post) = load_post(state, user, team_id, kind, id).await?;
    check_content(actor(&member, &post), ContentAction::Reject, post.status)?;

    post.status = ContentStatus::Draft;
    post.approved_by = None;
    post.review_note = clean_title(reason);
    let post = state.store.update_post(&post).await?;
    info!("{} rejected {} post {}", user.id, kind, id);
    Ok(post)
}

#[derive(Debug, Serialize)]
pub struct UploadSlot {
    pub key: String,
    pub upload_url: String,
    pub expires_in: u64,
}

fn content_type_allowed(kind: ContentKind, content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    match kind {
        ContentKind::Text => false,
        ContentKind::Image => content_type.starts_with("image/"),
        // Thumbnails share the reel and video folders
        ContentKind::Reel | ContentKind::Video => {
            content_type.starts_with("video/") || content_type.starts_with("image/")
        }
    }
}

/// Fresh object key and presigned PUT URL for a member's upload.
pub async fn create_upload(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    filename: &str,
    content_type: &str,
) -> Result<UploadSlot, ApiError> {
    require_member(state.store.as_ref(), team_id, user.id).await?;
    if !kind.has_media() {
        return Err(ApiError::invalid_field("kind", "Text posts have no uploads"));
    }
    if filename.trim().is_empty() {
        return Err(ApiError::invalid_field("filename", "A filename is required"));
    }
    if !content_type_allowed(kind, content_type) {
        return Err(ApiError::invalid_field(
            "content_type",
            format!("'{}' is not allowed for {} uploads", content_type, kind),
        ));
    }

    let ttl = state.config.storage.upload_url_ttl_secs;
    let key = upload_key(team_id, kind, filename);
    let upload_url = state
        .objects
        .presign_put(&key, content_type, Duration::from_secs(ttl))
        .await?;

    Ok(UploadSlot {
        key,
        upload_url,
        expires_in: ttl,
    })
}

#[derive(Debug, Serialize)]
pub struct MediaLink {
    pub key: String,
    pub url: String,
}

/// Short-lived download URLs for every object a post references.
pub async fn media_links(
    state: &AppState,
    user: &AuthUser,
    team_id: Uuid,
    kind: ContentKind,
    id: Uuid,
) -> Result<Vec<MediaLink>, ApiError> {
    let post = get(state, user, team_id, kind, id).await?;
    let ttl = Duration::from_secs(state.config.storage.download_url_ttl_secs);

    let mut links = Vec::new();
    for key in post.object_keys() {
        let url = state.objects.presign_get(&key, ttl).await?;
        links.push(MediaLink { key, url });
    }
    Ok(links)
}
