//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Session token and admin bootstrap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Token (and session) lifetime in hours.
    #[serde(default = "default_jwt_expires_in_hours")]
    pub jwt_expires_in_hours: u64,
    /// Initial admin username, created at startup when no users exist.
    #[serde(default)]
    pub admin_username: Option<String>,
    /// Initial admin password.
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Production mode: startup fails unless both admin credentials are set.
    #[serde(default)]
    pub production: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_expires_in_hours: default_jwt_expires_in_hours(),
            admin_username: None,
            admin_password: None,
            production: false,
        }
    }
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_jwt_expires_in_hours() -> u64 {
    24
}
