use crate::models::UserType;
use crate::repositories::RepositoryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Type alias for Result with our AuthError
pub type Result<T> = std::result::Result<T, AuthError>;

/// Closed failure taxonomy for the whole auth domain. Auth rejections
/// (credentials, OTP, token, session) are deliberately uninformative about
/// the cause to resist enumeration.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },

    #[error("An account or registration already exists for this email/username")]
    AlreadyExists {
        user_id: String,
        user_type: UserType,
        /// Minutes until a pending registration self-clears; `None` when the
        /// conflict is a verified account.
        minutes_remaining: Option<i64>,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not verified. Please verify OTP first.")]
    NotVerified,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session expired or invalid")]
    SessionExpired,

    #[error("Pending registration has expired")]
    RegistrationExpired,

    #[error("Failed to send email: {0}")]
    EmailDelivery(String),

    #[error("Identifier space exhausted for {0}")]
    ResourceExhausted(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AuthError::Database(e),
            RepositoryError::NotFound => AuthError::NotFound("record"),
            // Conflicts a caller can act on are mapped explicitly at the call
            // site, with the conflicting record's details attached.
            RepositoryError::AlreadyExists => {
                AuthError::Internal("unexpected uniqueness conflict".to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AuthError::InvalidArgument { .. } => (StatusCode::BAD_REQUEST, "invalid_argument"),
            AuthError::AlreadyExists { .. } => (StatusCode::CONFLICT, "already_exists"),
            AuthError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::NotVerified => (StatusCode::FORBIDDEN, "not_verified"),
            AuthError::InvalidOtp => (StatusCode::BAD_REQUEST, "invalid_otp"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "session_expired"),
            AuthError::RegistrationExpired => (StatusCode::GONE, "registration_expired"),
            AuthError::EmailDelivery(_) => (StatusCode::BAD_GATEWAY, "email_delivery_failed"),
            AuthError::ResourceExhausted(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "resource_exhausted")
            }
            AuthError::Database(_) | AuthError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let mut body = json!({
            "error": error_code,
            "message": self.public_message(),
        });

        if let AuthError::AlreadyExists {
            user_id,
            user_type,
            minutes_remaining,
        } = &self
        {
            body["user_id"] = json!(user_id);
            body["user_type"] = json!(user_type.as_str());
            if let Some(minutes) = minutes_remaining {
                body["minutes_remaining"] = json!(minutes);
            }
        }

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal failure");
        }

        (status, Json(body)).into_response()
    }
}

impl AuthError {
    /// Message safe to hand to the caller. Internal faults are collapsed to a
    /// generic line; everything else uses the display form.
    fn public_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AuthError::Internal("pool exhausted at 10.0.0.3".to_string());
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_credential_errors_share_shape() {
        // Missing user and wrong password both produce this exact variant, so
        // the caller-visible kind and message cannot diverge.
        let a = AuthError::InvalidCredentials.to_string();
        let b = AuthError::InvalidCredentials.to_string();
        assert_eq!(a, b);
    }
}
