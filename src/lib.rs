pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registration_service: Arc<services::RegistrationService>,
    pub session_service: Arc<services::SessionService>,
    pub otp_service: Arc<services::OtpService>,
    pub account_repository: Arc<dyn repositories::AccountRepository>,
    pub pending_repository: Arc<dyn repositories::PendingRepository>,
    pub otp_repository: Arc<dyn repositories::OtpRepository>,
    pub session_repository: Arc<dyn repositories::SessionRepository>,
    pub pool: sqlx::SqlitePool,
}
