//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An authentication session backing a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier (embedded in the token claims).
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Set when the session was revoked by logout.
    pub revoked_at: Option<DateTime<Utc>>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is still usable.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}
