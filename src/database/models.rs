use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{ContentKind, ContentStatus, InviteStatus, Platform, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A team as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSummary {
    #[serde(flatten)]
    pub team: Team,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
    pub name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub team_id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub token: String,
    pub status: InviteStatus,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub kind: ContentKind,
    pub title: Option<String>,
    pub body: String,
    pub status: ContentStatus,
    pub platforms: Vec<Platform>,
    pub media_keys: Vec<String>,
    pub thumbnail_key: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub approved_by: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub publish_results: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Every object-storage key this post references.
    pub fn object_keys(&self) -> Vec<String> {
        let mut keys = self.media_keys.clone();
        if let Some(thumb) = &self.thumbnail_key {
            keys.push(thumb.clone());
        }
        keys
    }
}

/// Encrypted token material for a platform connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub team_id: Uuid,
    pub platform: Platform,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    #[serde(skip)]
    pub access_token: String,
    #[serde(skip)]
    pub refresh_token: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub connected_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn tokens(&self) -> TokenSet {
        TokenSet {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
            scopes: self.scopes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub team_id: Uuid,
    pub stripe_customer_id: String,
    pub stripe_subscription_id: Option<String>,
    pub plan: Option<String>,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// What a user leaves behind, collected before and during account deletion
#[derive(Debug, Clone, Default)]
pub struct UserFootprint {
    pub owned_team_ids: Vec<Uuid>,
    /// Media of content the user authored in teams they do not own
    pub authored_object_keys: Vec<String>,
    /// Platform connections of the owned teams
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub kind: ContentKind,
    pub title: Option<String>,
    pub body: String,
    pub status: ContentStatus,
    pub platforms: Vec<Platform>,
    pub media_keys: Vec<String>,
    pub thumbnail_key: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewInvite {
    pub team_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConnection {
    pub team_id: Uuid,
    pub platform: Platform,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub tokens: TokenSet,
    pub connected_by: Uuid,
}
