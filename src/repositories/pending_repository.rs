use super::{profile_from_columns, profile_to_columns, RepositoryError, RepositoryResult};
use crate::models::{PendingRegistration, UserType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Admin listing filter. `email` matches as a case-insensitive substring.
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    pub email: Option<String>,
    pub user_type: Option<UserType>,
    pub include_expired: bool,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait PendingRepository: Send + Sync {
    async fn insert(&self, pending: &PendingRegistration) -> RepositoryResult<()>;
    /// Any matching record, live or expired; the caller decides what an
    /// expired one means.
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepositoryResult<Option<PendingRegistration>>;
    async fn find_live_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<PendingRegistration>>;
    async fn find_by_user_id(
        &self,
        user_id: &str,
    ) -> RepositoryResult<Option<PendingRegistration>>;
    async fn email_exists(&self, email: &str) -> RepositoryResult<bool>;
    /// Conditional delete; returns whether the record was still present.
    async fn delete_by_user_id(&self, user_id: &str) -> RepositoryResult<bool>;
    async fn user_id_exists(&self, user_id: &str) -> RepositoryResult<bool>;
    async fn list(
        &self,
        filter: &PendingFilter,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<PendingRegistration>>;
    async fn count_live(&self, now: DateTime<Utc>) -> RepositoryResult<i64>;
    async fn count_total(&self) -> RepositoryResult<i64>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    user_id: String,
    username: String,
    email: String,
    mobile: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    user_type: String,
    is_pregnant: Option<bool>,
    specialization: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<PendingRow> for PendingRegistration {
    type Error = RepositoryError;

    fn try_from(row: PendingRow) -> Result<Self, Self::Error> {
        let profile = profile_from_columns(&row.user_type, row.is_pregnant, row.specialization)?;
        Ok(PendingRegistration {
            user_id: row.user_id,
            username: row.username,
            email: row.email,
            mobile: row.mobile,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            profile,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

const PENDING_COLUMNS: &str = "user_id, username, email, mobile, password_hash, first_name, \
     last_name, user_type, is_pregnant, specialization, created_at, expires_at";

pub struct SqlitePendingRepository {
    pool: SqlitePool,
}

impl SqlitePendingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingRepository for SqlitePendingRepository {
    async fn insert(&self, pending: &PendingRegistration) -> RepositoryResult<()> {
        let (is_pregnant, specialization) = profile_to_columns(&pending.profile);
        let result = sqlx::query(
            "INSERT INTO pending_registrations (user_id, username, email, mobile, password_hash, \
             first_name, last_name, user_type, is_pregnant, specialization, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&pending.user_id)
        .bind(&pending.username)
        .bind(&pending.email)
        .bind(&pending.mobile)
        .bind(&pending.password_hash)
        .bind(&pending.first_name)
        .bind(&pending.last_name)
        .bind(pending.profile.user_type().as_str())
        .bind(is_pregnant)
        .bind(specialization)
        .bind(pending.created_at)
        .bind(pending.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE") => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepositoryResult<Option<PendingRegistration>> {
        let row: Option<PendingRow> = sqlx::query_as(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_registrations \
             WHERE email = ? OR username = ? LIMIT 1"
        ))
        .bind(email)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingRegistration::try_from).transpose()
    }

    async fn find_live_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<PendingRegistration>> {
        let row: Option<PendingRow> = sqlx::query_as(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_registrations \
             WHERE email = ? AND expires_at > ?"
        ))
        .bind(email)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingRegistration::try_from).transpose()
    }

    async fn find_by_user_id(
        &self,
        user_id: &str,
    ) -> RepositoryResult<Option<PendingRegistration>> {
        let row: Option<PendingRow> = sqlx::query_as(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_registrations WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingRegistration::try_from).transpose()
    }

    async fn email_exists(&self, email: &str) -> RepositoryResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_registrations WHERE email = ?")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn delete_by_user_id(&self, user_id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM pending_registrations WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn user_id_exists(&self, user_id: &str) -> RepositoryResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_registrations WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn list(
        &self,
        filter: &PendingFilter,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<PendingRegistration>> {
        let rows: Vec<PendingRow> = sqlx::query_as(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_registrations \
             WHERE (? IS NULL OR email LIKE '%' || ? || '%') \
               AND (? IS NULL OR user_type = ?) \
               AND (? OR expires_at > ?) \
             ORDER BY created_at DESC"
        ))
        .bind(&filter.email)
        .bind(&filter.email)
        .bind(filter.user_type.map(|t| t.as_str()))
        .bind(filter.user_type.map(|t| t.as_str()))
        .bind(filter.include_expired)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(PendingRegistration::try_from)
            .collect()
    }

    async fn count_live(&self, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_registrations WHERE expires_at > ?")
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_total(&self) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_registrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM pending_registrations WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
