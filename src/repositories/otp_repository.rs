use super::{RepositoryError, RepositoryResult};
use crate::models::{OtpCode, OtpPurpose};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait OtpRepository: Send + Sync {
    async fn insert(&self, otp: &OtpCode) -> RepositoryResult<()>;
    /// Whether a live code matching the exact (email, code, purpose) triple
    /// exists, without spending it.
    async fn matches(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;
    /// Single-use consumption: conditionally deletes a live code matching the
    /// exact (email, code, purpose) triple and reports whether one was there.
    /// A second call with the same triple finds nothing.
    async fn consume(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;
    /// Invalidate all outstanding codes for an email and purpose.
    async fn delete_by_purpose(&self, email: &str, purpose: OtpPurpose) -> RepositoryResult<u64>;
    async fn count_live(&self, now: DateTime<Utc>) -> RepositoryResult<i64>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

pub struct SqliteOtpRepository {
    pool: SqlitePool,
}

impl SqliteOtpRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpRepository for SqliteOtpRepository {
    async fn insert(&self, otp: &OtpCode) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO otp_codes (email, code, purpose, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&otp.email)
        .bind(&otp.code)
        .bind(otp.purpose.as_str())
        .bind(otp.created_at)
        .bind(otp.expires_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::Database)?;

        Ok(())
    }

    async fn matches(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM otp_codes \
             WHERE email = ? AND code = ? AND purpose = ? AND expires_at > ?",
        )
        .bind(email)
        .bind(code)
        .bind(purpose.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn consume(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "DELETE FROM otp_codes \
             WHERE email = ? AND code = ? AND purpose = ? AND expires_at > ?",
        )
        .bind(email)
        .bind(code)
        .bind(purpose.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_purpose(&self, email: &str, purpose: OtpPurpose) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE email = ? AND purpose = ?")
            .bind(email)
            .bind(purpose.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_live(&self, now: DateTime<Utc>) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM otp_codes WHERE expires_at > ?")
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
