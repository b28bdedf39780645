use crate::error::{AuthError, Result};
use crate::models::{UserSession, UserType};
use crate::repositories::{AccountRepository, SessionRepository};
use crate::services::token_service::TokenService;
use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const SESSION_TTL_MINUTES: i64 = 30;

#[derive(Debug)]
pub struct LoginResult {
    pub token: String,
    pub session_id: String,
    pub user_id: String,
    pub user_type: UserType,
}

/// Identity attached to a request after its token checked out.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub user_type: UserType,
    pub session_id: String,
}

/// Login, token validation, and revocation. Sessions carry an absolute
/// expiry fixed at login; activity refreshes `last_activity_at` but never
/// extends the lifetime.
pub struct SessionService {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    tokens: Arc<TokenService>,
}

impl SessionService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionRepository>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            accounts,
            sessions,
            tokens,
        }
    }

    /// The identifier may be a username, email, or public user id. Unknown
    /// identifier and wrong password produce the same error.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResult> {
        let account = self
            .accounts
            .find_by_identifier(identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if account.verified_at.is_none() {
            return Err(AuthError::NotVerified);
        }

        if !verify_password(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let session = UserSession {
            session_id: Uuid::new_v4().to_string(),
            user_id: account.user_id.clone(),
            user_type: account.user_type(),
            created_at: now,
            last_activity_at: now,
            expires_at: now + Duration::minutes(SESSION_TTL_MINUTES),
            active: true,
        };
        self.sessions.insert(&session).await?;

        let token = self
            .tokens
            .issue(&account.user_id, account.user_type(), &session.session_id)?;

        tracing::info!(
            user_id = account.user_id,
            session_id = session.session_id,
            "login succeeded"
        );
        let user_type = account.user_type();
        Ok(LoginResult {
            token,
            session_id: session.session_id,
            user_id: account.user_id,
            user_type,
        })
    }

    /// A token is good only while its session row is still live; revocation
    /// and absolute expiry both kill it regardless of the embedded `exp`.
    pub async fn validate(&self, token: &str) -> Result<AuthContext> {
        let claims = self.tokens.verify(token).ok_or(AuthError::InvalidToken)?;

        let now = Utc::now();
        let session = self
            .sessions
            .find_live(&claims.session_id, now)
            .await?
            .ok_or(AuthError::SessionExpired)?;

        if let Err(e) = self.sessions.touch(&session.session_id, now).await {
            tracing::warn!(session_id = session.session_id, "failed to touch session: {e}");
        }

        Ok(AuthContext {
            user_id: claims.sub,
            user_type: claims.user_type,
            session_id: claims.session_id,
        })
    }

    /// Returns whether a live session was actually revoked.
    pub async fn logout(&self, session_id: &str) -> Result<bool> {
        let revoked = self.sessions.deactivate(session_id).await?;
        if revoked {
            tracing::info!(session_id, "session closed");
        }
        Ok(revoked)
    }

    pub async fn logout_all(&self, user_id: &str) -> Result<u64> {
        let closed = self.sessions.deactivate_all(user_id).await?;
        tracing::info!(user_id, closed, "closed all sessions");
        Ok(closed)
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<UserSession>> {
        Ok(self.sessions.list_live(user_id, Utc::now()).await?)
    }
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
