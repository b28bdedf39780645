use crate::error::Result;
use crate::handlers::bearer_token;
use crate::services::registration_service::RegisterRequest;
use crate::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response> {
    let receipt = state.registration_service.register(request).await?;

    Ok(Json(json!({
        "message": "Registration received. Check your email for the verification code.",
        "user_id": receipt.user_id,
        "status": "pending_verification",
        "expires_in_minutes": receipt.expires_in_minutes,
    }))
    .into_response())
}

/// Resends a verification code to a pending registration (or an account that
/// somehow lost its first code). Same issuing path as registration.
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Response> {
    state
        .otp_service
        .issue(&request.email, crate::models::OtpPurpose::Verify)
        .await?;

    Ok(Json(json!({
        "message": "Verification code sent.",
        "email": request.email,
    }))
    .into_response())
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Response> {
    let verified = state
        .registration_service
        .verify(&request.email, &request.otp)
        .await?;

    Ok(Json(json!({
        "message": "Email verified. Your account is now active.",
        "user_id": verified.user_id,
        "user_type": verified.user_type,
        "status": "verified",
    }))
    .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let result = state
        .session_service
        .login(&request.identifier, &request.password)
        .await?;

    Ok(Json(json!({
        "access_token": result.token,
        "token_type": "bearer",
        "user_id": result.user_id,
        "user_type": result.user_type,
        "session_id": result.session_id,
    }))
    .into_response())
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Response> {
    state
        .registration_service
        .request_password_reset(&request.email)
        .await?;

    Ok(Json(json!({
        "message": "Password reset code sent.",
        "email": request.email,
    }))
    .into_response())
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Response> {
    state
        .registration_service
        .reset_password(&request.email, &request.otp, &request.new_password)
        .await?;

    Ok(Json(json!({
        "message": "Password has been reset. You can now log in.",
    }))
    .into_response())
}

pub async fn validate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let token = bearer_token(&headers)?;
    let context = state.session_service.validate(token).await?;

    Ok(Json(json!({
        "valid": true,
        "user_id": context.user_id,
        "user_type": context.user_type,
    }))
    .into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let token = bearer_token(&headers)?;
    let context = state.session_service.validate(token).await?;
    let success = state.session_service.logout(&context.session_id).await?;

    Ok(Json(json!({
        "message": "Logged out.",
        "success": success,
    }))
    .into_response())
}

pub async fn logout_all(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let token = bearer_token(&headers)?;
    let context = state.session_service.validate(token).await?;
    let closed = state.session_service.logout_all(&context.user_id).await?;

    Ok(Json(json!({
        "message": "All sessions logged out.",
        "sessions_closed": closed,
    }))
    .into_response())
}

pub async fn list_sessions(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let token = bearer_token(&headers)?;
    let context = state.session_service.validate(token).await?;
    let sessions = state
        .session_service
        .list_sessions(&context.user_id)
        .await?;

    Ok(Json(json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
    .into_response())
}
