pub mod account_repository;
pub mod otp_repository;
pub mod pending_repository;
pub mod session_repository;

pub use account_repository::{AccountRepository, SqliteAccountRepository};
pub use otp_repository::{OtpRepository, SqliteOtpRepository};
pub use pending_repository::{PendingFilter, PendingRepository, SqlitePendingRepository};
pub use session_repository::{SessionRepository, SqliteSessionRepository};

use crate::models::Profile;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Record already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Reassemble the tagged profile from its column representation.
pub(crate) fn profile_from_columns(
    user_type: &str,
    is_pregnant: Option<bool>,
    specialization: Option<String>,
) -> RepositoryResult<Profile> {
    match user_type {
        "patient" => Ok(Profile::Patient {
            is_pregnant: is_pregnant.unwrap_or(false),
        }),
        "doctor" => Ok(Profile::Doctor { specialization }),
        other => Err(RepositoryError::Database(sqlx::Error::Decode(
            format!("unknown user_type in row: {other}").into(),
        ))),
    }
}

/// Split the tagged profile back into its column representation.
pub(crate) fn profile_to_columns(profile: &Profile) -> (Option<bool>, Option<String>) {
    match profile {
        Profile::Patient { is_pregnant } => (Some(*is_pregnant), None),
        Profile::Doctor { specialization } => (None, specialization.clone()),
    }
}
