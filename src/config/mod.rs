use std::env;
use tracing::warn;

/// Runtime configuration, read once at startup. Everything has a
/// development-friendly default; production deployments are expected to set
/// the real values and pass `validate_production_config`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub rate_limit_max_attempts: usize,
    pub rate_limit_window_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set; using a random secret (tokens die with the process)");
                uuid::Uuid::new_v4().to_string()
            }
        };

        let rate_limit_max_attempts = env::var("RATE_LIMIT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        let rate_limit_window_secs = env::var("RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(900);

        Self {
            host,
            port,
            jwt_secret,
            rate_limit_max_attempts,
            rate_limit_window_secs,
        }
    }
}

pub fn validate_production_config() {
    if current_environment() != "production" {
        return;
    }

    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set in production");

    if secret.len() < 32 {
        panic!("FATAL: JWT_SECRET must be at least 32 bytes in production");
    }

    let lowered = secret.to_ascii_lowercase();
    if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default") {
        panic!("FATAL: JWT_SECRET appears to be a default value. Generate a secure secret!");
    }
}

fn current_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}
