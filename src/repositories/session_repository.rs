use super::{RepositoryError, RepositoryResult};
use crate::models::{UserSession, UserType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: &UserSession) -> RepositoryResult<()>;
    /// The session, only if it is active and not past its absolute expiry.
    async fn find_live(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<UserSession>>;
    /// Best-effort last-activity refresh; last write wins.
    async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> RepositoryResult<()>;
    /// Deactivate a single session; returns whether it was active.
    async fn deactivate(&self, session_id: &str) -> RepositoryResult<bool>;
    /// Deactivate every active session for a user; returns how many.
    async fn deactivate_all(&self, user_id: &str) -> RepositoryResult<u64>;
    async fn list_live(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<UserSession>>;
    async fn count_active(&self) -> RepositoryResult<i64>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    user_id: String,
    user_type: String,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    active: bool,
}

impl TryFrom<SessionRow> for UserSession {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let user_type: UserType = row.user_type.parse().map_err(|_| {
            RepositoryError::Database(sqlx::Error::Decode(
                format!("unknown user_type in session row: {}", row.user_type).into(),
            ))
        })?;
        Ok(UserSession {
            session_id: row.session_id,
            user_id: row.user_id,
            user_type,
            created_at: row.created_at,
            last_activity_at: row.last_activity_at,
            expires_at: row.expires_at,
            active: row.active,
        })
    }
}

const SESSION_COLUMNS: &str =
    "session_id, user_id, user_type, created_at, last_activity_at, expires_at, active";

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn insert(&self, session: &UserSession) -> RepositoryResult<()> {
        let result = sqlx::query(
            "INSERT INTO sessions (session_id, user_id, user_type, created_at, \
             last_activity_at, expires_at, active) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(session.user_type.as_str())
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .bind(session.active)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE") => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_live(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<UserSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE session_id = ? AND active = 1 AND expires_at > ?"
        ))
        .bind(session_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserSession::try_from).transpose()
    }

    async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> RepositoryResult<()> {
        sqlx::query("UPDATE sessions SET last_activity_at = ? WHERE session_id = ?")
            .bind(now)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate(&self, session_id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("UPDATE sessions SET active = 0 WHERE session_id = ? AND active = 1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_all(&self, user_id: &str) -> RepositoryResult<u64> {
        let result = sqlx::query("UPDATE sessions SET active = 0 WHERE user_id = ? AND active = 1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_live(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<UserSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = ? AND active = 1 AND expires_at > ? \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserSession::try_from).collect()
    }

    async fn count_active(&self) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
