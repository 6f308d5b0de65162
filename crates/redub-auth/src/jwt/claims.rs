//! JWT claims embedded in every session token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redub_entity::user::UserRole;

/// Claims payload for a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the user id.
    pub sub: Uuid,
    /// Session id this token belongs to.
    pub sid: Uuid,
    /// User role at issuance time.
    pub role: UserRole,
    /// Username for convenience.
    pub username: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Token id.
    pub jti: Uuid,
}

impl Claims {
    /// Returns the user id from the subject claim.
    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns the session id.
    pub fn session_id(&self) -> Uuid {
        self.sid
    }
}
