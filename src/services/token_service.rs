use crate::error::{AuthError, Result};
use crate::models::UserType;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims embedded in a bearer token. `exp` makes the token itself
/// time-limited independently of the stored session.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_type: UserType,
    pub session_id: String,
    pub exp: usize,
}

/// Signed bearer-token codec (HS256). The token is structural proof only;
/// session liveness is checked against the store separately.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(
        &self,
        user_id: &str,
        user_type: UserType,
        session_id: &str,
    ) -> Result<String> {
        let exp = (Utc::now() + self.ttl).timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_owned(),
            user_type,
            session_id: session_id.to_owned(),
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token encoding failed: {e}")))
    }

    /// Malformed, bad-signature, and expired tokens all decode to `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .ok()
    }
}
