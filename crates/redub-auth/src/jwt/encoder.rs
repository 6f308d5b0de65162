//! JWT token creation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use redub_core::config::AuthConfig;
use redub_core::error::AppError;
use redub_entity::user::User;

use super::claims::Claims;

/// Creates signed session tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Token TTL in hours.
    expires_in_hours: i64,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("expires_in_hours", &self.expires_in_hours)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            expires_in_hours: config.jwt_expires_in_hours as i64,
        }
    }

    /// Expiry a fresh token issued now would carry.
    pub fn expires_at_from_now(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::hours(self.expires_in_hours)
    }

    /// Generates a session token for the given user and session.
    pub fn generate_token(
        &self,
        user: &User,
        session_id: Uuid,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let now = Utc::now();
        let exp = now + chrono::Duration::hours(self.expires_in_hours);

        let claims = Claims {
            sub: user.id,
            sid: session_id,
            role: user.role,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))?;

        Ok((token, exp))
    }
}
