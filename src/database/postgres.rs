use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::manager::DatabaseManager;
use super::models::*;
use super::store::{Store, StoreError, StoreResult};
use crate::types::{ContentKind, ContentStatus, InviteStatus, Platform, Role};

const POST_COLUMNS: &str = "id, team_id, user_id, title, body, status, platforms, media_keys, \
     thumbnail_key, scheduled_at, review_note, approved_by, published_at, publish_results, \
     created_at, updated_at";

const MEMBER_SELECT: &str = "SELECT m.team_id, m.user_id, m.role, u.email, u.name, m.joined_at \
     FROM team_members m JOIN users u ON u.id = m.user_id";

const INVITE_COLUMNS: &str =
    "id, team_id, email, role, token, status, invited_by, expires_at, created_at, updated_at";

const CONNECTION_COLUMNS: &str = "id, team_id, platform, account_id, account_name, access_token, \
     refresh_token, scopes, expires_at, connected_by, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TeamRow {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TeamSummaryRow {
    #[sqlx(flatten)]
    team: TeamRow,
    role: String,
}

#[derive(FromRow)]
struct MemberRow {
    team_id: Uuid,
    user_id: Uuid,
    role: String,
    email: String,
    name: Option<String>,
    joined_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct InviteRow {
    id: Uuid,
    team_id: Uuid,
    email: String,
    role: String,
    token: String,
    status: String,
    invited_by: Uuid,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    team_id: Uuid,
    user_id: Uuid,
    title: Option<String>,
    body: String,
    status: String,
    platforms: Vec<String>,
    media_keys: Vec<String>,
    thumbnail_key: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    review_note: Option<String>,
    approved_by: Option<Uuid>,
    published_at: Option<DateTime<Utc>>,
    publish_results: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ConnectionRow {
    id: Uuid,
    team_id: Uuid,
    platform: String,
    account_id: Option<String>,
    account_name: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    scopes: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
    connected_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SubscriptionRow {
    team_id: Uuid,
    stripe_customer_id: String,
    stripe_subscription_id: Option<String>,
    plan: Option<String>,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            team_id: row.team_id,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            plan: row.plan,
            status: row.status,
            current_period_end: row.current_period_end,
            updated_at: row.updated_at,
        }
    }
}

fn parse<T: std::str::FromStr<Err = crate::types::ParseEnumError>>(value: &str) -> StoreResult<T> {
    value.parse().map_err(|e: crate::types::ParseEnumError| StoreError::Corrupt(e.to_string()))
}

impl TeamSummaryRow {
    fn into_model(self) -> StoreResult<TeamSummary> {
        Ok(TeamSummary {
            role: parse(&self.role)?,
            team: self.team.into(),
        })
    }
}

impl MemberRow {
    fn into_model(self) -> StoreResult<Member> {
        Ok(Member {
            team_id: self.team_id,
            user_id: self.user_id,
            role: parse(&self.role)?,
            email: self.email,
            name: self.name,
            joined_at: self.joined_at,
        })
    }
}

impl InviteRow {
    fn into_model(self) -> StoreResult<Invite> {
        Ok(Invite {
            id: self.id,
            team_id: self.team_id,
            email: self.email,
            role: parse(&self.role)?,
            token: self.token,
            status: parse(&self.status)?,
            invited_by: self.invited_by,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PostRow {
    fn into_model(self, kind: ContentKind) -> StoreResult<Post> {
        let platforms = self
            .platforms
            .iter()
            .map(|p| parse::<Platform>(p))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Post {
            id: self.id,
            team_id: self.team_id,
            user_id: self.user_id,
            kind,
            title: self.title,
            body: self.body,
            status: parse(&self.status)?,
            platforms,
            media_keys: self.media_keys,
            thumbnail_key: self.thumbnail_key,
            scheduled_at: self.scheduled_at,
            review_note: self.review_note,
            approved_by: self.approved_by,
            published_at: self.published_at,
            publish_results: self.publish_results,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ConnectionRow {
    fn into_model(self) -> StoreResult<Connection> {
        Ok(Connection {
            id: self.id,
            team_id: self.team_id,
            platform: parse(&self.platform)?,
            account_id: self.account_id,
            account_name: self.account_name,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scopes: self.scopes,
            expires_at: self.expires_at,
            connected_by: self.connected_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn platform_strings(platforms: &[Platform]) -> Vec<String> {
    platforms.iter().map(|p| p.as_str().to_string()).collect()
}

/// Map a unique-constraint violation to `Conflict`.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message.to_string()),
        _ => StoreError::Sqlx(err),
    }
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_member(conn: &mut PgConnection, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<Member>> {
        let sql = format!("{} WHERE m.team_id = $1 AND m.user_id = $2", MEMBER_SELECT);
        sqlx::query_as::<_, MemberRow>(&sql)
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(conn)
            .await?
            .map(MemberRow::into_model)
            .transpose()
    }

    async fn owned_team_ids(conn: &mut PgConnection, user_id: Uuid, lock: bool) -> StoreResult<Vec<Uuid>> {
        let sql = if lock {
            "SELECT id FROM teams WHERE owner_id = $1 FOR UPDATE"
        } else {
            "SELECT id FROM teams WHERE owner_id = $1"
        };
        Ok(sqlx::query_scalar(sql).bind(user_id).fetch_all(conn).await?)
    }

    /// Object keys of content the user authored outside `owned` teams
    async fn authored_keys(conn: &mut PgConnection, user_id: Uuid, owned: &[Uuid]) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for kind in ContentKind::ALL.iter().filter(|k| k.has_media()) {
            let sql = format!(
                "SELECT media_keys, thumbnail_key FROM {} WHERE user_id = $1 AND NOT (team_id = ANY($2))",
                kind.table()
            );
            let rows: Vec<(Vec<String>, Option<String>)> = sqlx::query_as(&sql)
                .bind(user_id)
                .bind(owned)
                .fetch_all(&mut *conn)
                .await?;
            for (media, thumb) in rows {
                keys.extend(media);
                keys.extend(thumb);
            }
        }
        Ok(keys)
    }

    async fn team_connections(conn: &mut PgConnection, team_ids: &[Uuid]) -> StoreResult<Vec<Connection>> {
        let sql = format!(
            "SELECT {} FROM platform_connections WHERE team_id = ANY($1)",
            CONNECTION_COLUMNS
        );
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(team_ids)
            .fetch_all(conn)
            .await?
            .into_iter()
            .map(ConnectionRow::into_model)
            .collect()
    }

    /// Delete every row belonging to `team_ids`
    async fn purge_teams(conn: &mut PgConnection, team_ids: &[Uuid]) -> StoreResult<u64> {
        for kind in ContentKind::ALL {
            let sql = format!("DELETE FROM {} WHERE team_id = ANY($1)", kind.table());
            sqlx::query(&sql).bind(team_ids).execute(&mut *conn).await?;
        }
        for sql in [
            "DELETE FROM team_invites WHERE team_id = ANY($1)",
            "DELETE FROM team_members WHERE team_id = ANY($1)",
            "DELETE FROM platform_connections WHERE team_id = ANY($1)",
            "DELETE FROM subscriptions WHERE team_id = ANY($1)",
        ] {
            sqlx::query(sql).bind(team_ids).execute(&mut *conn).await?;
        }
        let result = sqlx::query("DELETE FROM teams WHERE id = ANY($1)")
            .bind(team_ids)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn upsert_user(&self, id: Uuid, email: &str, name: Option<&str>) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET email = EXCLUDED.email,
                    name = COALESCE(EXCLUDED.name, users.name),
                    updated_at = now()
                WHERE users.deleted_at IS NULL
            RETURNING id, email, name, is_admin, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, is_admin, created_at, updated_at FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn create_team(&self, name: &str, owner_id: Uuid) -> StoreResult<Team> {
        let mut tx = self.pool.begin().await?;

        let team = sqlx::query_as::<_, TeamRow>(
            "INSERT INTO teams (id, name, owner_id) VALUES ($1, $2, $3) \
             RETURNING id, name, owner_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO team_members (team_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(team.id)
            .bind(owner_id)
            .bind(Role::Owner.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(team.into())
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(
            "SELECT id, name, owner_id, created_at, updated_at FROM teams WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Team::from))
    }

    async fn list_user_teams(&self, user_id: Uuid) -> StoreResult<Vec<TeamSummary>> {
        sqlx::query_as::<_, TeamSummaryRow>(
            "SELECT t.id, t.name, t.owner_id, t.created_at, t.updated_at, m.role \
             FROM teams t JOIN team_members m ON m.team_id = t.id \
             WHERE m.user_id = $1 ORDER BY t.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TeamSummaryRow::into_model)
        .collect()
    }

    async fn rename_team(&self, id: Uuid, name: &str) -> StoreResult<Team> {
        sqlx::query_as::<_, TeamRow>(
            "UPDATE teams SET name = $2, updated_at = now() WHERE id = $1 \
             RETURNING id, name, owner_id, created_at, updated_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(Team::from)
        .ok_or_else(|| StoreError::NotFound(format!("team {}", id)))
    }

    async fn get_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<Member>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_member(&mut conn, team_id, user_id).await
    }

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<Member>> {
        let sql = format!("{} WHERE m.team_id = $1 ORDER BY m.joined_at", MEMBER_SELECT);
        sqlx::query_as::<_, MemberRow>(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(MemberRow::into_model)
            .collect()
    }

    async fn update_member_role(&self, team_id: Uuid, user_id: Uuid, role: Role) -> StoreResult<Member> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE team_members SET role = $3 WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("member {} of team {}", user_id, team_id)));
        }
        let member = Self::fetch_member(&mut tx, team_id, user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("member {}", user_id)))?;
        tx.commit().await?;
        Ok(member)
    }

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_invite(&self, invite: NewInvite) -> StoreResult<Invite> {
        let mut tx = self.pool.begin().await?;

        let is_member: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM team_members m JOIN users u ON u.id = m.user_id \
             WHERE m.team_id = $1 AND lower(u.email) = lower($2))",
        )
        .bind(invite.team_id)
        .bind(&invite.email)
        .fetch_one(&mut *tx)
        .await?;
        if is_member {
            return Err(StoreError::Conflict(format!("{} is already a member", invite.email)));
        }

        // Lapsed invites no longer block a new one
        sqlx::query(
            "UPDATE team_invites SET status = 'EXPIRED', updated_at = now() \
             WHERE team_id = $1 AND email = $2 AND status = 'PENDING' AND expires_at <= now()",
        )
        .bind(invite.team_id)
        .bind(&invite.email)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "INSERT INTO team_invites (id, team_id, email, role, token, status, invited_by, expires_at) \
             VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7) RETURNING {}",
            INVITE_COLUMNS
        );
        let row = sqlx::query_as::<_, InviteRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(invite.team_id)
            .bind(&invite.email)
            .bind(invite.role.as_str())
            .bind(&invite.token)
            .bind(invite.invited_by)
            .bind(invite.expires_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "An invitation is already pending for this email"))?;

        tx.commit().await?;
        row.into_model()
    }

    async fn get_invite(&self, id: Uuid) -> StoreResult<Option<Invite>> {
        let sql = format!("SELECT {} FROM team_invites WHERE id = $1", INVITE_COLUMNS);
        sqlx::query_as::<_, InviteRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(InviteRow::into_model)
            .transpose()
    }

    async fn get_invite_by_token(&self, token: &str) -> StoreResult<Option<Invite>> {
        let sql = format!("SELECT {} FROM team_invites WHERE token = $1", INVITE_COLUMNS);
        sqlx::query_as::<_, InviteRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .map(InviteRow::into_model)
            .transpose()
    }

    async fn list_invites(&self, team_id: Uuid) -> StoreResult<Vec<Invite>> {
        let sql = format!(
            "SELECT {} FROM team_invites WHERE team_id = $1 ORDER BY created_at DESC",
            INVITE_COLUMNS
        );
        sqlx::query_as::<_, InviteRow>(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(InviteRow::into_model)
            .collect()
    }

    async fn set_invite_status(&self, id: Uuid, status: InviteStatus) -> StoreResult<Invite> {
        let sql = format!(
            "UPDATE team_invites SET status = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            INVITE_COLUMNS
        );
        sqlx::query_as::<_, InviteRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("invite {}", id)))?
            .into_model()
    }

    async fn accept_invite(&self, invite_id: Uuid, user_id: Uuid) -> StoreResult<Member> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM team_invites WHERE id = $1 FOR UPDATE", INVITE_COLUMNS);
        let invite = sqlx::query_as::<_, InviteRow>(&sql)
            .bind(invite_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("invite {}", invite_id)))?
            .into_model()?;

        if invite.status != InviteStatus::Pending {
            return Err(StoreError::Conflict(format!("Invitation is {}", invite.status)));
        }

        sqlx::query("UPDATE team_invites SET status = 'ACCEPTED', updated_at = now() WHERE id = $1")
            .bind(invite_id)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(invite.team_id)
        .bind(user_id)
        .bind(invite.role.as_str())
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict("Already a member of this team".to_string()));
        }

        let member = Self::fetch_member(&mut tx, invite.team_id, user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("member {}", user_id)))?;

        tx.commit().await?;
        Ok(member)
    }

    async fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        let sql = format!(
            "INSERT INTO {} (id, team_id, user_id, title, body, status, platforms, media_keys, thumbnail_key, scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            post.kind.table(),
            POST_COLUMNS
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(post.team_id)
            .bind(post.user_id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.status.as_str())
            .bind(platform_strings(&post.platforms))
            .bind(&post.media_keys)
            .bind(&post.thumbnail_key)
            .bind(post.scheduled_at)
            .fetch_one(&self.pool)
            .await?
            .into_model(post.kind)
    }

    async fn get_post(&self, kind: ContentKind, team_id: Uuid, id: Uuid) -> StoreResult<Option<Post>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND team_id = $2",
            POST_COLUMNS,
            kind.table()
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.into_model(kind))
            .transpose()
    }

    async fn list_posts(
        &self,
        kind: ContentKind,
        team_id: Uuid,
        status: Option<ContentStatus>,
    ) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE team_id = $1 AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC",
            POST_COLUMNS,
            kind.table()
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(team_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.into_model(kind))
            .collect()
    }

    async fn update_post(&self, post: &Post) -> StoreResult<Post> {
        let sql = format!(
            "UPDATE {} SET title = $3, body = $4, status = $5, platforms = $6, media_keys = $7, \
             thumbnail_key = $8, scheduled_at = $9, review_note = $10, approved_by = $11, \
             published_at = $12, publish_results = $13, updated_at = now() \
             WHERE id = $1 AND team_id = $2 RETURNING {}",
            post.kind.table(),
            POST_COLUMNS
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(post.id)
            .bind(post.team_id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.status.as_str())
            .bind(platform_strings(&post.platforms))
            .bind(&post.media_keys)
            .bind(&post.thumbnail_key)
            .bind(post.scheduled_at)
            .bind(&post.review_note)
            .bind(post.approved_by)
            .bind(post.published_at)
            .bind(&post.publish_results)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} post {}", post.kind, post.id)))?
            .into_model(post.kind)
    }

    async fn delete_post(&self, kind: ContentKind, team_id: Uuid, id: Uuid) -> StoreResult<Option<Post>> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND team_id = $2 RETURNING {}",
            kind.table(),
            POST_COLUMNS
        );
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.into_model(kind))
            .transpose()
    }

    async fn save_connection(&self, connection: NewConnection) -> StoreResult<Connection> {
        let sql = format!(
            "INSERT INTO platform_connections \
                (id, team_id, platform, account_id, account_name, access_token, refresh_token, scopes, expires_at, connected_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (team_id, platform) DO UPDATE SET \
                account_id = EXCLUDED.account_id, account_name = EXCLUDED.account_name, \
                access_token = EXCLUDED.access_token, refresh_token = EXCLUDED.refresh_token, \
                scopes = EXCLUDED.scopes, expires_at = EXCLUDED.expires_at, \
                connected_by = EXCLUDED.connected_by, updated_at = now() \
             RETURNING {}",
            CONNECTION_COLUMNS
        );
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(connection.team_id)
            .bind(connection.platform.as_str())
            .bind(&connection.account_id)
            .bind(&connection.account_name)
            .bind(&connection.tokens.access_token)
            .bind(&connection.tokens.refresh_token)
            .bind(&connection.tokens.scopes)
            .bind(connection.tokens.expires_at)
            .bind(connection.connected_by)
            .fetch_one(&self.pool)
            .await?
            .into_model()
    }

    async fn get_connection(&self, team_id: Uuid, platform: Platform) -> StoreResult<Option<Connection>> {
        let sql = format!(
            "SELECT {} FROM platform_connections WHERE team_id = $1 AND platform = $2",
            CONNECTION_COLUMNS
        );
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(team_id)
            .bind(platform.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(ConnectionRow::into_model)
            .transpose()
    }

    async fn list_connections(&self, team_id: Uuid) -> StoreResult<Vec<Connection>> {
        let mut conn = self.pool.acquire().await?;
        Self::team_connections(&mut conn, &[team_id]).await
    }

    async fn update_connection_tokens(&self, id: Uuid, tokens: &TokenSet) -> StoreResult<Connection> {
        let sql = format!(
            "UPDATE platform_connections SET access_token = $2, refresh_token = $3, expires_at = $4, \
             scopes = $5, updated_at = now() WHERE id = $1 RETURNING {}",
            CONNECTION_COLUMNS
        );
        sqlx::query_as::<_, ConnectionRow>(&sql)
            .bind(id)
            .bind(&tokens.access_token)
            .bind(&tokens.refresh_token)
            .bind(tokens.expires_at)
            .bind(&tokens.scopes)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("connection {}", id)))?
            .into_model()
    }

    async fn delete_connection(&self, team_id: Uuid, platform: Platform) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM platform_connections WHERE team_id = $1 AND platform = $2")
            .bind(team_id)
            .bind(platform.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_subscription(&self, team_id: Uuid) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT team_id, stripe_customer_id, stripe_subscription_id, plan, status, current_period_end, updated_at \
             FROM subscriptions WHERE team_id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Subscription::from))
    }

    async fn get_subscription_by_customer(&self, customer_id: &str) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT team_id, stripe_customer_id, stripe_subscription_id, plan, status, current_period_end, updated_at \
             FROM subscriptions WHERE stripe_customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Subscription::from))
    }

    async fn save_subscription(&self, subscription: &Subscription) -> StoreResult<Subscription> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            INSERT INTO subscriptions
                (team_id, stripe_customer_id, stripe_subscription_id, plan, status, current_period_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (team_id) DO UPDATE SET
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = now()
            RETURNING team_id, stripe_customer_id, stripe_subscription_id, plan, status, current_period_end, updated_at
            "#,
        )
        .bind(subscription.team_id)
        .bind(&subscription.stripe_customer_id)
        .bind(&subscription.stripe_subscription_id)
        .bind(&subscription.plan)
        .bind(&subscription.status)
        .bind(subscription.current_period_end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Stripe customer already belongs to another team"))?;
        Ok(row.into())
    }

    async fn delete_team(&self, team_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted = Self::purge_teams(&mut tx, &[team_id]).await?;
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn user_footprint(&self, user_id: Uuid) -> StoreResult<UserFootprint> {
        let mut conn = self.pool.acquire().await?;
        let owned_team_ids = Self::owned_team_ids(&mut conn, user_id, false).await?;
        let authored_object_keys = Self::authored_keys(&mut conn, user_id, &owned_team_ids).await?;
        let connections = Self::team_connections(&mut conn, &owned_team_ids).await?;
        Ok(UserFootprint {
            owned_team_ids,
            authored_object_keys,
            connections,
        })
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<UserFootprint> {
        let mut tx = self.pool.begin().await?;

        let owned_team_ids = Self::owned_team_ids(&mut tx, user_id, true).await?;
        let authored_object_keys = Self::authored_keys(&mut tx, user_id, &owned_team_ids).await?;
        let connections = Self::team_connections(&mut tx, &owned_team_ids).await?;

        Self::purge_teams(&mut tx, &owned_team_ids).await?;

        for kind in ContentKind::ALL {
            let sql = format!("DELETE FROM {} WHERE user_id = $1", kind.table());
            sqlx::query(&sql).bind(user_id).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM team_invites WHERE invited_by = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM team_members WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // Tombstone so a still-valid identity token cannot recreate the account
        let result = sqlx::query(
            "UPDATE users SET deleted_at = now(), email = '', name = NULL, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back the purge
            return Err(StoreError::NotFound(format!("user {}", user_id)));
        }

        tx.commit().await?;
        Ok(UserFootprint {
            owned_team_ids,
            authored_object_keys,
            connections,
        })
    }
}
