use crate::error::{AuthError, Result};
use crate::models::{OtpPurpose, PendingSummary, UserType};
use crate::repositories::PendingFilter;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct PendingQuery {
    pub email: Option<String>,
    pub user_type: Option<String>,
    #[serde(default)]
    pub include_expired: bool,
}

pub async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Response> {
    let user_type = match query.user_type.as_deref() {
        None => None,
        Some(raw) => Some(raw.parse::<UserType>().map_err(|_| {
            AuthError::InvalidArgument {
                field: "user_type",
                message: "must be 'patient' or 'doctor'".to_string(),
            }
        })?),
    };

    let filter = PendingFilter {
        email: query.email,
        user_type,
        include_expired: query.include_expired,
    };

    let now = Utc::now();
    let pending = state.pending_repository.list(&filter, now).await?;
    let summaries: Vec<PendingSummary> = pending
        .into_iter()
        .map(|p| PendingSummary::from_pending(p, now))
        .collect();

    Ok(Json(json!({
        "count": summaries.len(),
        "pending_users": summaries,
    }))
    .into_response())
}

pub async fn delete_pending(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    if !state.pending_repository.delete_by_user_id(&user_id).await? {
        return Err(AuthError::NotFound("pending registration"));
    }

    tracing::info!(user_id, "pending registration removed by admin");
    Ok(Json(json!({
        "message": "Pending registration deleted.",
        "user_id": user_id,
    }))
    .into_response())
}

/// Resends the verification code for a pending registration. Expired
/// registrations cannot be revived; the user has to register again.
pub async fn resend_otp(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    let pending = state
        .pending_repository
        .find_by_user_id(&user_id)
        .await?
        .ok_or(AuthError::NotFound("pending registration"))?;

    if pending.is_expired(Utc::now()) {
        return Err(AuthError::RegistrationExpired);
    }

    state
        .otp_service
        .issue(&pending.email, OtpPurpose::Verify)
        .await?;

    Ok(Json(json!({
        "message": "Verification code resent.",
        "user_id": user_id,
        "email": pending.email,
    }))
    .into_response())
}

pub async fn status(State(state): State<AppState>) -> Result<Response> {
    let now = Utc::now();
    let patients = state.account_repository.count(UserType::Patient).await?;
    let doctors = state.account_repository.count(UserType::Doctor).await?;
    let pending_live = state.pending_repository.count_live(now).await?;
    let pending_total = state.pending_repository.count_total().await?;
    let otp_live = state.otp_repository.count_live(now).await?;
    let sessions_active = state.session_repository.count_active().await?;

    Ok(Json(json!({
        "accounts": {
            "patients": patients,
            "doctors": doctors,
        },
        "pending_registrations": {
            "live": pending_live,
            "total": pending_total,
        },
        "otp_codes_live": otp_live,
        "sessions_active": sessions_active,
    }))
    .into_response())
}
