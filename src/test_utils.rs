pub mod test_helpers {
    use crate::models::{
        Account, OtpCode, OtpPurpose, PendingRegistration, Profile, UserSession, UserType,
    };
    use crate::repositories::{
        AccountRepository, OtpRepository, PendingRepository, SessionRepository,
        SqliteAccountRepository, SqliteOtpRepository, SqlitePendingRepository,
        SqliteSessionRepository,
    };
    use chrono::{DateTime, Duration, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use tempfile::NamedTempFile;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    pub fn hash_test_password(password: &str) -> String {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .expect("password hashing should not fail in tests")
            .to_string()
    }

    pub fn sample_patient_profile() -> Profile {
        Profile::Patient { is_pregnant: false }
    }

    /// Insert a verified (or unverified) account directly, bypassing the
    /// registration flow.
    pub async fn insert_test_account(
        pool: &SqlitePool,
        user_id: &str,
        username: &str,
        email: &str,
        password: &str,
        profile: Profile,
        verified: bool,
    ) -> Account {
        let now = Utc::now();
        let account = Account {
            user_id: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            mobile: "555-0100".to_string(),
            password_hash: hash_test_password(password),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            profile,
            verified_at: verified.then_some(now),
            created_at: now,
        };

        SqliteAccountRepository::new(pool.clone())
            .insert(&account)
            .await
            .expect("account insert should succeed");

        account
    }

    /// Insert a pending registration with an explicit expiry, so tests can
    /// plant both live and already-expired records.
    pub async fn insert_test_pending(
        pool: &SqlitePool,
        user_id: &str,
        username: &str,
        email: &str,
        profile: Profile,
        expires_at: DateTime<Utc>,
    ) -> PendingRegistration {
        let pending = PendingRegistration {
            user_id: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            mobile: "555-0100".to_string(),
            password_hash: hash_test_password("test-password"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            profile,
            created_at: expires_at - Duration::minutes(30),
            expires_at,
        };

        SqlitePendingRepository::new(pool.clone())
            .insert(&pending)
            .await
            .expect("pending insert should succeed");

        pending
    }

    /// Insert an OTP code with an explicit expiry.
    pub async fn insert_test_otp(
        pool: &SqlitePool,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
        expires_at: DateTime<Utc>,
    ) {
        let otp = OtpCode {
            email: email.to_string(),
            code: code.to_string(),
            purpose,
            created_at: expires_at - Duration::minutes(10),
            expires_at,
        };

        SqliteOtpRepository::new(pool.clone())
            .insert(&otp)
            .await
            .expect("otp insert should succeed");
    }

    /// Insert a session row with an explicit expiry and active flag.
    pub async fn insert_test_session(
        pool: &SqlitePool,
        session_id: &str,
        user_id: &str,
        user_type: UserType,
        expires_at: DateTime<Utc>,
        active: bool,
    ) -> UserSession {
        let session = UserSession {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            user_type,
            created_at: expires_at - Duration::minutes(30),
            last_activity_at: expires_at - Duration::minutes(30),
            expires_at,
            active,
        };

        SqliteSessionRepository::new(pool.clone())
            .insert(&session)
            .await
            .expect("session insert should succeed");

        session
    }
}
