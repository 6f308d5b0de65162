//! JWT token validation.

use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind as JwtErrorKind};

use redub_core::config::AuthConfig;
use redub_core::error::AppError;

use super::claims::Claims;

/// Decodes and validates session tokens.
#[derive(Clone)]
pub struct JwtDecoder {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder").finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Decode a token, verifying signature and expiry.
    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => {
                    AppError::session_expired("Session token has expired")
                }
                _ => AppError::unauthorized("Invalid session token"),
            })
    }
}
