use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window attempt counter keyed by client address. Protects the
/// credential-bearing endpoints from brute force; state is in-process only.
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window: Duration::from_secs(window_secs),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Records an attempt for `key` and reports whether it is allowed.
    /// Entries older than the window are pruned on the way.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            // A poisoned lock only means another check panicked; the counts
            // are still usable.
            Err(poisoned) => poisoned.into_inner(),
        };

        let entry = attempts.entry(key.to_owned()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() >= self.max_attempts {
            return false;
        }

        entry.push(now);
        true
    }

    /// Drops keys whose every attempt has aged out of the window, so the map
    /// does not accumulate an entry per client address forever. Returns how
    /// many keys were dropped; meant to be called periodically.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let before = attempts.len();
        attempts.retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < self.window);
            !entries.is_empty()
        });
        before - attempts.len()
    }
}

/// Best-effort client key: proxy headers first, then the socket address.
fn client_key(request: &Request) -> String {
    for header in ["x-real-ip", "x-forwarded-for"] {
        if let Some(value) = request.headers().get(header) {
            if let Ok(value) = value.to_str() {
                if let Some(ip) = value.split(',').next() {
                    let ip = ip.trim();
                    if !ip.is_empty() {
                        return ip.to_owned();
                    }
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

pub async fn rate_limit_middleware(
    State(limiter): State<std::sync::Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);

    if !limiter.check(&key) {
        tracing::warn!(client = key, path = %request.uri().path(), "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "Too many attempts. Please try again later."
            })),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(3, 900);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, 900);
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn test_window_expiry_frees_slots() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.check("10.0.0.1"));
        // Zero-second window: the first attempt has already aged out.
        assert!(limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_prune_drops_idle_keys() {
        let limiter = RateLimiter::new(5, 0);
        limiter.check("10.0.0.1");
        limiter.check("10.0.0.2");

        // Zero-second window: both keys are idle by the time prune runs.
        assert_eq!(limiter.prune(), 2);
        // Nothing left to drop
        assert_eq!(limiter.prune(), 0);
    }

    #[test]
    fn test_prune_keeps_live_keys() {
        let limiter = RateLimiter::new(5, 900);
        limiter.check("10.0.0.1");
        assert_eq!(limiter.prune(), 0);
    }
}
