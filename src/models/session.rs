use super::account::UserType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A login session. `expires_at` is absolute from login; validation refreshes
/// `last_activity_at` only. `active = false` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub session_id: String,
    pub user_id: String,
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl UserSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
