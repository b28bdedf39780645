use super::account::Profile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unverified registration. Holds everything needed to mint the account
/// once the OTP is confirmed; self-expires 30 minutes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whole minutes until expiry, rounded up; zero once expired.
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> i64 {
        let seconds = (self.expires_at - now).num_seconds();
        if seconds <= 0 {
            0
        } else {
            (seconds + 59) / 60
        }
    }
}

/// Admin-facing view of a pending registration: password hash redacted,
/// expiry status computed at read time.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: &'static str,
    pub time_remaining: Option<String>,
}

impl PendingSummary {
    pub fn from_pending(pending: PendingRegistration, now: DateTime<Utc>) -> Self {
        let expired = pending.is_expired(now);
        let time_remaining = if expired {
            None
        } else {
            Some(format!("{} minutes", pending.minutes_remaining(now)))
        };

        Self {
            user_id: pending.user_id,
            username: pending.username,
            email: pending.email,
            mobile: pending.mobile,
            first_name: pending.first_name,
            last_name: pending.last_name,
            profile: pending.profile,
            created_at: pending.created_at,
            expires_at: pending.expires_at,
            status: if expired { "expired" } else { "pending" },
            time_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::Profile;
    use chrono::Duration;

    fn sample(expires_at: DateTime<Utc>) -> PendingRegistration {
        PendingRegistration {
            user_id: "PAT00000001".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            mobile: "555-0100".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Ames".to_string(),
            profile: Profile::Patient { is_pregnant: false },
            created_at: expires_at - Duration::minutes(30),
            expires_at,
        }
    }

    #[test]
    fn test_minutes_remaining_rounds_up() {
        let now = Utc::now();
        let pending = sample(now + Duration::seconds(61));
        assert_eq!(pending.minutes_remaining(now), 2);
        assert!(!pending.is_expired(now));
    }

    #[test]
    fn test_expired_summary_redacts_and_flags() {
        let now = Utc::now();
        let summary = PendingSummary::from_pending(sample(now - Duration::minutes(1)), now);
        assert_eq!(summary.status, "expired");
        assert!(summary.time_remaining.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
