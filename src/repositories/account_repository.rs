use super::{profile_from_columns, profile_to_columns, RepositoryError, RepositoryResult};
use crate::models::{Account, UserType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AccountRepository: Send + Sync {
    async fn insert(&self, account: &Account) -> RepositoryResult<()>;
    /// Lookup by username, email, or public user id, patient accounts first.
    async fn find_by_identifier(&self, identifier: &str) -> RepositoryResult<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Account>>;
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepositoryResult<Option<Account>>;
    async fn user_id_exists(&self, user_id: &str) -> RepositoryResult<bool>;
    /// Returns whether a row was updated.
    async fn update_password_by_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> RepositoryResult<bool>;
    async fn count(&self, user_type: UserType) -> RepositoryResult<i64>;
}

#[derive(sqlx::FromRow)]
struct AccountRow {
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
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let profile = profile_from_columns(&row.user_type, row.is_pregnant, row.specialization)?;
        Ok(Account {
            user_id: row.user_id,
            username: row.username,
            email: row.email,
            mobile: row.mobile,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            profile,
            verified_at: row.verified_at,
            created_at: row.created_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "user_id, username, email, mobile, password_hash, first_name, \
     last_name, user_type, is_pregnant, specialization, verified_at, created_at";

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn insert(&self, account: &Account) -> RepositoryResult<()> {
        let (is_pregnant, specialization) = profile_to_columns(&account.profile);
        let result = sqlx::query(
            "INSERT INTO accounts (user_id, username, email, mobile, password_hash, first_name, \
             last_name, user_type, is_pregnant, specialization, verified_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.user_id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.mobile)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.user_type().as_str())
        .bind(is_pregnant)
        .bind(specialization)
        .bind(account.verified_at)
        .bind(account.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE") => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_identifier(&self, identifier: &str) -> RepositoryResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE username = ? OR email = ? OR user_id = ? \
             ORDER BY CASE user_type WHEN 'patient' THEN 0 ELSE 1 END \
             LIMIT 1"
        ))
        .bind(identifier)
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepositoryResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ? OR username = ? LIMIT 1"
        ))
        .bind(email)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn user_id_exists(&self, user_id: &str) -> RepositoryResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn update_password_by_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query("UPDATE accounts SET password_hash = ? WHERE email = ?")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, user_type: UserType) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE user_type = ?")
            .bind(user_type.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
