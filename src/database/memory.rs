use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::*;
use super::store::{Store, StoreError, StoreResult};
use crate::types::{ContentKind, ContentStatus, InviteStatus, Platform, Role};

#[derive(Debug, Clone)]
struct MemberRecord {
    role: Role,
    joined_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tombstones: HashSet<Uuid>,
    teams: HashMap<Uuid, Team>,
    members: HashMap<(Uuid, Uuid), MemberRecord>,
    invites: HashMap<Uuid, Invite>,
    posts: HashMap<(ContentKind, Uuid), Post>,
    connections: HashMap<(Uuid, Platform), Connection>,
    subscriptions: HashMap<Uuid, Subscription>,
}

impl Tables {
    fn member(&self, team_id: Uuid, user_id: Uuid) -> Option<Member> {
        let record = self.members.get(&(team_id, user_id))?;
        let user = self.users.get(&user_id)?;
        Some(Member {
            team_id,
            user_id,
            role: record.role,
            email: user.email.clone(),
            name: user.name.clone(),
            joined_at: record.joined_at,
        })
    }

    fn owned_team_ids(&self, user_id: Uuid) -> Vec<Uuid> {
        let mut teams: Vec<&Team> = self.teams.values().filter(|t| t.owner_id == user_id).collect();
        teams.sort_by_key(|t| t.created_at);
        teams.into_iter().map(|t| t.id).collect()
    }

    fn footprint(&self, user_id: Uuid) -> UserFootprint {
        let owned_team_ids = self.owned_team_ids(user_id);
        let authored_object_keys = self
            .posts
            .values()
            .filter(|p| p.user_id == user_id && !owned_team_ids.contains(&p.team_id))
            .flat_map(Post::object_keys)
            .collect();
        let connections = self
            .connections
            .values()
            .filter(|c| owned_team_ids.contains(&c.team_id))
            .cloned()
            .collect();
        UserFootprint {
            owned_team_ids,
            authored_object_keys,
            connections,
        }
    }

    fn purge_team(&mut self, team_id: Uuid) -> bool {
        self.posts.retain(|_, p| p.team_id != team_id);
        self.invites.retain(|_, i| i.team_id != team_id);
        self.members.retain(|(team, _), _| *team != team_id);
        self.connections.retain(|(team, _), _| *team != team_id);
        self.subscriptions.remove(&team_id);
        self.teams.remove(&team_id).is_some()
    }
}

/// In-process store used by tests and `--memory` servers. A single lock
/// guards every table, so multi-row operations are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or revoke platform-admin rights. Admin status is provisioned
    /// out of band in Postgres; tests use this instead.
    pub async fn set_admin(&self, user_id: Uuid, is_admin: bool) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        user.is_admin = is_admin;
        Ok(())
    }

    /// Move an invite's expiry, for exercising expiry paths in tests.
    pub async fn set_invite_expiry(&self, id: Uuid, expires_at: chrono::DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let invite = tables
            .invites
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("invite {}", id)))?;
        invite.expires_at = expires_at;
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert_user(&self, id: Uuid, email: &str, name: Option<&str>) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if tables.tombstones.contains(&id) {
            return Ok(None);
        }
        let now = Utc::now();
        let user = tables.users.entry(id).or_insert_with(|| User {
            id,
            email: email.to_string(),
            name: None,
            is_admin: false,
            created_at: now,
            updated_at: now,
        });
        user.email = email.to_string();
        if let Some(name) = name {
            user.name = Some(name.to_string());
        }
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create_team(&self, name: &str, owner_id: Uuid) -> StoreResult<Team> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner_id) {
            return Err(StoreError::NotFound(format!("user {}", owner_id)));
        }
        let now = Utc::now();
        let team = Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        tables.teams.insert(team.id, team.clone());
        tables.members.insert(
            (team.id, owner_id),
            MemberRecord {
                role: Role::Owner,
                joined_at: now,
            },
        );
        Ok(team)
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.tables.read().await.teams.get(&id).cloned())
    }

    async fn list_user_teams(&self, user_id: Uuid) -> StoreResult<Vec<TeamSummary>> {
        let tables = self.tables.read().await;
        let mut teams: Vec<TeamSummary> = tables
            .members
            .iter()
            .filter(|((_, user), _)| *user == user_id)
            .filter_map(|((team_id, _), record)| {
                tables.teams.get(team_id).map(|team| TeamSummary {
                    team: team.clone(),
                    role: record.role,
                })
            })
            .collect();
        teams.sort_by_key(|s| s.team.created_at);
        Ok(teams)
    }

    async fn rename_team(&self, id: Uuid, name: &str) -> StoreResult<Team> {
        let mut tables = self.tables.write().await;
        let team = tables
            .teams
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("team {}", id)))?;
        team.name = name.to_string();
        team.updated_at = Utc::now();
        Ok(team.clone())
    }

    async fn get_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<Member>> {
        Ok(self.tables.read().await.member(team_id, user_id))
    }

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<Member>> {
        let tables = self.tables.read().await;
        let mut members: Vec<Member> = tables
            .members
            .keys()
            .filter(|(team, _)| *team == team_id)
            .filter_map(|(team, user)| tables.member(*team, *user))
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn update_member_role(&self, team_id: Uuid, user_id: Uuid, role: Role) -> StoreResult<Member> {
        let mut tables = self.tables.write().await;
        let record = tables
            .members
            .get_mut(&(team_id, user_id))
            .ok_or_else(|| StoreError::NotFound(format!("member {} of team {}", user_id, team_id)))?;
        record.role = role;
        tables
            .member(team_id, user_id)
            .ok_or_else(|| StoreError::NotFound(format!("member {}", user_id)))
    }

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.members.remove(&(team_id, user_id)).is_some())
    }

    async fn create_invite(&self, invite: NewInvite) -> StoreResult<Invite> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let is_member = tables.members.keys().any(|(team, user)| {
            *team == invite.team_id
                && tables
                    .users
                    .get(user)
                    .is_some_and(|u| u.email.trim().to_lowercase() == invite.email)
        });
        if is_member {
            return Err(StoreError::Conflict(format!("{} is already a member", invite.email)));
        }

        for existing in tables.invites.values_mut() {
            if existing.team_id == invite.team_id
                && existing.email == invite.email
                && existing.status == InviteStatus::Pending
            {
                if existing.is_expired(now) {
                    existing.status = InviteStatus::Expired;
                    existing.updated_at = now;
                } else {
                    return Err(StoreError::Conflict(
                        "An invitation is already pending for this email".to_string(),
                    ));
                }
            }
        }

        let created = Invite {
            id: Uuid::new_v4(),
            team_id: invite.team_id,
            email: invite.email,
            role: invite.role,
            token: invite.token,
            status: InviteStatus::Pending,
            invited_by: invite.invited_by,
            expires_at: invite.expires_at,
            created_at: now,
            updated_at: now,
        };
        tables.invites.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_invite(&self, id: Uuid) -> StoreResult<Option<Invite>> {
        Ok(self.tables.read().await.invites.get(&id).cloned())
    }

    async fn get_invite_by_token(&self, token: &str) -> StoreResult<Option<Invite>> {
        let tables = self.tables.read().await;
        Ok(tables.invites.values().find(|i| i.token == token).cloned())
    }

    async fn list_invites(&self, team_id: Uuid) -> StoreResult<Vec<Invite>> {
        let tables = self.tables.read().await;
        let mut invites: Vec<Invite> = tables
            .invites
            .values()
            .filter(|i| i.team_id == team_id)
            .cloned()
            .collect();
        invites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invites)
    }

    async fn set_invite_status(&self, id: Uuid, status: InviteStatus) -> StoreResult<Invite> {
        let mut tables = self.tables.write().await;
        let invite = tables
            .invites
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("invite {}", id)))?;
        invite.status = status;
        invite.updated_at = Utc::now();
        Ok(invite.clone())
    }

    async fn accept_invite(&self, invite_id: Uuid, user_id: Uuid) -> StoreResult<Member> {
        let mut tables = self.tables.write().await;
        let invite = tables
            .invites
            .get(&invite_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("invite {}", invite_id)))?;

        if invite.status != InviteStatus::Pending {
            return Err(StoreError::Conflict(format!("Invitation is {}", invite.status)));
        }
        if tables.members.contains_key(&(invite.team_id, user_id)) {
            return Err(StoreError::Conflict("Already a member of this team".to_string()));
        }

        let now = Utc::now();
        if let Some(stored) = tables.invites.get_mut(&invite_id) {
            stored.status = InviteStatus::Accepted;
            stored.updated_at = now;
        }
        tables.members.insert(
            (invite.team_id, user_id),
            MemberRecord {
                role: invite.role,
                joined_at: now,
            },
        );
        tables
            .member(invite.team_id, user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }

    async fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        let now = Utc::now();
        let created = Post {
            id: Uuid::new_v4(),
            team_id: post.team_id,
            user_id: post.user_id,
            kind: post.kind,
            title: post.title,
            body: post.body,
            status: post.status,
            platforms: post.platforms,
            media_keys: post.media_keys,
            thumbnail_key: post.thumbnail_key,
            scheduled_at: post.scheduled_at,
            review_note: None,
            approved_by: None,
            published_at: None,
            publish_results: json!({}),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .posts
            .insert((created.kind, created.id), created.clone());
        Ok(created)
    }

    async fn get_post(&self, kind: ContentKind, team_id: Uuid, id: Uuid) -> StoreResult<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&(kind, id)).filter(|p| p.team_id == team_id).cloned())
    }

    async fn list_posts(
        &self,
        kind: ContentKind,
        team_id: Uuid,
        status: Option<ContentStatus>,
    ) -> StoreResult<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| p.kind == kind && p.team_id == team_id)
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn update_post(&self, post: &Post) -> StoreResult<Post> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .posts
            .get_mut(&(post.kind, post.id))
            .filter(|p| p.team_id == post.team_id)
            .ok_or_else(|| StoreError::NotFound(format!("{} post {}", post.kind, post.id)))?;
        let created_at = stored.created_at;
        *stored = post.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_post(&self, kind: ContentKind, team_id: Uuid, id: Uuid) -> StoreResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        match tables.posts.get(&(kind, id)) {
            Some(post) if post.team_id == team_id => Ok(tables.posts.remove(&(kind, id))),
            _ => Ok(None),
        }
    }

    async fn save_connection(&self, connection: NewConnection) -> StoreResult<Connection> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let key = (connection.team_id, connection.platform);
        let (id, created_at) = tables
            .connections
            .get(&key)
            .map(|c| (c.id, c.created_at))
            .unwrap_or_else(|| (Uuid::new_v4(), now));

        let saved = Connection {
            id,
            team_id: connection.team_id,
            platform: connection.platform,
            account_id: connection.account_id,
            account_name: connection.account_name,
            access_token: connection.tokens.access_token,
            refresh_token: connection.tokens.refresh_token,
            scopes: connection.tokens.scopes,
            expires_at: connection.tokens.expires_at,
            connected_by: connection.connected_by,
            created_at,
            updated_at: now,
        };
        tables.connections.insert(key, saved.clone());
        Ok(saved)
    }

    async fn get_connection(&self, team_id: Uuid, platform: Platform) -> StoreResult<Option<Connection>> {
        Ok(self.tables.read().await.connections.get(&(team_id, platform)).cloned())
    }

    async fn list_connections(&self, team_id: Uuid) -> StoreResult<Vec<Connection>> {
        let tables = self.tables.read().await;
        let mut connections: Vec<Connection> = tables
            .connections
            .values()
            .filter(|c| c.team_id == team_id)
            .cloned()
            .collect();
        connections.sort_by_key(|c| c.platform);
        Ok(connections)
    }

    async fn update_connection_tokens(&self, id: Uuid, tokens: &TokenSet) -> StoreResult<Connection> {
        let mut tables = self.tables.write().await;
        let connection = tables
            .connections
            .values_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("connection {}", id)))?;
        connection.access_token = tokens.access_token.clone();
        connection.refresh_token = tokens.refresh_token.clone();
        connection.expires_at = tokens.expires_at;
        connection.scopes = tokens.scopes.clone();
        connection.updated_at = Utc::now();
        Ok(connection.clone())
    }

    async fn delete_connection(&self, team_id: Uuid, platform: Platform) -> StoreResult<bool> {
        Ok(self.tables.write().await.connections.remove(&(team_id, platform)).is_some())
    }

    async fn get_subscription(&self, team_id: Uuid) -> StoreResult<Option<Subscription>> {
        Ok(self.tables.read().await.subscriptions.get(&team_id).cloned())
    }

    async fn get_subscription_by_customer(&self, customer_id: &str) -> StoreResult<Option<Subscription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .values()
            .find(|s| s.stripe_customer_id == customer_id)
            .cloned())
    }

    async fn save_subscription(&self, subscription: &Subscription) -> StoreResult<Subscription> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .subscriptions
            .values()
            .any(|s| s.stripe_customer_id == subscription.stripe_customer_id && s.team_id != subscription.team_id);
        if taken {
            return Err(StoreError::Conflict(
                "Stripe customer already belongs to another team".to_string(),
            ));
        }
        let mut saved = subscription.clone();
        saved.updated_at = Utc::now();
        tables.subscriptions.insert(saved.team_id, saved.clone());
        Ok(saved)
    }

    async fn delete_team(&self, team_id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.purge_team(team_id))
    }

    async fn user_footprint(&self, user_id: Uuid) -> StoreResult<UserFootprint> {
        Ok(self.tables.read().await.footprint(user_id))
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<UserFootprint> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }

        let footprint = tables.footprint(user_id);
        for team_id in &footprint.owned_team_ids {
            tables.purge_team(*team_id);
        }
        tables.posts.retain(|_, p| p.user_id != user_id);
        tables.invites.retain(|_, i| i.invited_by != user_id);
        tables.members.retain(|(_, user), _| *user != user_id);
        tables.users.remove(&user_id);
        tables.tombstones.insert(user_id);
        Ok(footprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .upsert_user(Uuid::new_v4(), "owner@example.com", Some("Owner"))
            .await
            .unwrap()
            .unwrap();
        (store, user)
    }

    fn invite_for(team_id: Uuid, invited_by: Uuid, email: &str) -> NewInvite {
        NewInvite {
            team_id,
            email: email.to_string(),
            role: Role::Editor,
            token: Uuid::new_v4().simple().to_string(),
            invited_by,
            expires_at: Utc::now() + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn create_team_makes_creator_owner() {
        let (store, user) = seeded().await;
        let team = store.create_team("Studio", user.id).await.unwrap();

        let member = store.get_member(team.id, user.id).await.unwrap().unwrap();
        assert_eq!(member.role, Role::Owner);
        assert_eq!(member.email, "owner@example.com");

        let teams = store.list_user_teams(user.id).await.unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].role, Role::Owner);
    }

    #[tokio::test]
    async fn duplicate_pending_invite_conflicts() {
        let (store, user) = seeded().await;
        let team = store.create_team("Studio", user.id).await.unwrap();

        store
            .create_invite(invite_for(team.id, user.id, "editor@example.com"))
            .await
            .unwrap();
        let second = store
            .create_invite(invite_for(team.id, user.id, "editor@example.com"))
            .await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn expired_invite_does_not_block_reinvite() {
        let (store, user) = seeded().await;
        let team = store.create_team("Studio", user.id).await.unwrap();

        let first = store
            .create_invite(invite_for(team.id, user.id, "editor@example.com"))
            .await
            .unwrap();
        store
            .set_invite_expiry(first.id, Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        store
            .create_invite(invite_for(team.id, user.id, "editor@example.com"))
            .await
            .unwrap();
        let old = store.get_invite(first.id).await.unwrap().unwrap();
        assert_eq!(old.status, InviteStatus::Expired);
    }

    #[tokio::test]
    async fn inviting_a_member_conflicts() {
        let (store, user) = seeded().await;
        let team = store.create_team("Studio", user.id).await.unwrap();

        let result = store
            .create_invite(invite_for(team.id, user.id, "OWNER@example.com"))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn accept_invite_adds_member_once() {
        let (store, owner) = seeded().await;
        let team = store.create_team("Studio", owner.id).await.unwrap();
        let editor = store
            .upsert_user(Uuid::new_v4(), "editor@example.com", None)
            .await
            .unwrap()
            .unwrap();

        let invite = store
            .create_invite(invite_for(team.id, owner.id, "editor@example.com"))
            .await
            .unwrap();
        let member = store.accept_invite(invite.id, editor.id).await.unwrap();
        assert_eq!(member.role, Role::Editor);

        let again = store.accept_invite(invite.id, editor.id).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn posts_are_scoped_to_team() {
        let (store, user) = seeded().await;
        let team = store.create_team("Studio", user.id).await.unwrap();
        let other = store.create_team("Other", user.id).await.unwrap();

        let post = store
            .create_post(NewPost {
                team_id: team.id,
                user_id: user.id,
                kind: ContentKind::Text,
                title: None,
                body: "hello".to_string(),
                status: ContentStatus::Draft,
                platforms: vec![Platform::X],
                media_keys: vec![],
                thumbnail_key: None,
                scheduled_at: None,
            })
            .await
            .unwrap();

        assert!(store.get_post(ContentKind::Text, other.id, post.id).await.unwrap().is_none());
        assert!(store.get_post(ContentKind::Image, team.id, post.id).await.unwrap().is_none());
        assert!(store.delete_post(ContentKind::Text, other.id, post.id).await.unwrap().is_none());
        assert!(store.delete_post(ContentKind::Text, team.id, post.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleted_user_is_tombstoned() {
        let (store, user) = seeded().await;
        store.create_team("Studio", user.id).await.unwrap();

        let footprint = store.delete_user(user.id).await.unwrap();
        assert_eq!(footprint.owned_team_ids.len(), 1);
        assert!(store.list_user_teams(user.id).await.unwrap().is_empty());

        let again = store
            .upsert_user(user.id, "owner@example.com", None)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn delete_user_collects_authored_keys_in_other_teams() {
        let (store, owner) = seeded().await;
        let team = store.create_team("Studio", owner.id).await.unwrap();
        let editor = store
            .upsert_user(Uuid::new_v4(), "editor@example.com", None)
            .await
            .unwrap()
            .unwrap();
        let invite = store
            .create_invite(invite_for(team.id, owner.id, "editor@example.com"))
            .await
            .unwrap();
        store.accept_invite(invite.id, editor.id).await.unwrap();

        let key = format!("teams/{}/image/a.png", team.id);
        store
            .create_post(NewPost {
                team_id: team.id,
                user_id: editor.id,
                kind: ContentKind::Image,
                title: None,
                body: String::new(),
                status: ContentStatus::Draft,
                platforms: vec![],
                media_keys: vec![key.clone()],
                thumbnail_key: None,
                scheduled_at: None,
            })
            .await
            .unwrap();

        let footprint = store.delete_user(editor.id).await.unwrap();
        assert!(footprint.owned_team_ids.is_empty());
        assert_eq!(footprint.authored_object_keys, vec![key]);
        assert!(store.list_posts(ContentKind::Image, team.id, None).await.unwrap().is_empty());
        assert!(store.get_member(team.id, editor.id).await.unwrap().is_none());
    }
}
