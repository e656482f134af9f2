use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::*;
use crate::types::{ContentKind, ContentStatus, InviteStatus, Platform, Role};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unreadable row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for every entity of the service.
///
/// Multi-row operations (`create_team`, `create_invite`, `accept_invite`,
/// `delete_team`, `delete_user`) are atomic: either every row changes or
/// none does.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn ping(&self) -> StoreResult<()>;

    // Users
    /// Insert or refresh a user from identity claims. Returns `None` for a
    /// user that has been deleted.
    async fn upsert_user(&self, id: Uuid, email: &str, name: Option<&str>) -> StoreResult<Option<User>>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    // Teams
    async fn create_team(&self, name: &str, owner_id: Uuid) -> StoreResult<Team>;
    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>>;
    async fn list_user_teams(&self, user_id: Uuid) -> StoreResult<Vec<TeamSummary>>;
    async fn rename_team(&self, id: Uuid, name: &str) -> StoreResult<Team>;

    // Members
    async fn get_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<Member>>;
    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<Member>>;
    async fn update_member_role(&self, team_id: Uuid, user_id: Uuid, role: Role) -> StoreResult<Member>;
    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    // Invites
    /// Fails with `Conflict` when the email already belongs to a member or
    /// has a pending invite for the team.
    async fn create_invite(&self, invite: NewInvite) -> StoreResult<Invite>;
    async fn get_invite(&self, id: Uuid) -> StoreResult<Option<Invite>>;
    async fn get_invite_by_token(&self, token: &str) -> StoreResult<Option<Invite>>;
    async fn list_invites(&self, team_id: Uuid) -> StoreResult<Vec<Invite>>;
    async fn set_invite_status(&self, id: Uuid, status: InviteStatus) -> StoreResult<Invite>;
    /// Marks the invite accepted and inserts the membership.
    async fn accept_invite(&self, invite_id: Uuid, user_id: Uuid) -> StoreResult<Member>;

    // Content
    async fn create_post(&self, post: NewPost) -> StoreResult<Post>;
    async fn get_post(&self, kind: ContentKind, team_id: Uuid, id: Uuid) -> StoreResult<Option<Post>>;
    async fn list_posts(
        &self,
        kind: ContentKind,
        team_id: Uuid,
        status: Option<ContentStatus>,
    ) -> StoreResult<Vec<Post>>;
    /// Persist every mutable field of `post`.
    async fn update_post(&self, post: &Post) -> StoreResult<Post>;
    async fn delete_post(&self, kind: ContentKind, team_id: Uuid, id: Uuid) -> StoreResult<Option<Post>>;

    // Platform connections
    /// Insert, replacing an existing connection for the same team and platform.
    async fn save_connection(&self, connection: NewConnection) -> StoreResult<Connection>;
    async fn get_connection(&self, team_id: Uuid, platform: Platform) -> StoreResult<Option<Connection>>;
    async fn list_connections(&self, team_id: Uuid) -> StoreResult<Vec<Connection>>;
    async fn update_connection_tokens(&self, id: Uuid, tokens: &TokenSet) -> StoreResult<Connection>;
    async fn delete_connection(&self, team_id: Uuid, platform: Platform) -> StoreResult<bool>;

    // Billing
    async fn get_subscription(&self, team_id: Uuid) -> StoreResult<Option<Subscription>>;
    async fn get_subscription_by_customer(&self, customer_id: &str) -> StoreResult<Option<Subscription>>;
    async fn save_subscription(&self, subscription: &Subscription) -> StoreResult<Subscription>;

    // Cascading deletes
    /// Delete the team with its content, invites, members, connections and
    /// subscription.
    async fn delete_team(&self, team_id: Uuid) -> StoreResult<bool>;
    async fn user_footprint(&self, user_id: Uuid) -> StoreResult<UserFootprint>;
    /// Delete the user's owned teams, memberships and authored content, then
    /// tombstone the user. Returns the footprint as observed inside the
    /// transaction.
    async fn delete_user(&self, user_id: Uuid) -> StoreResult<UserFootprint>;
}
