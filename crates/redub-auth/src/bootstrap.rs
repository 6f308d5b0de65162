//! Initial admin account bootstrap.

use tracing::{info, warn};

use redub_core::config::AuthConfig;
use redub_core::error::AppError;
use redub_database::repositories::user::UserRepository;
use redub_entity::user::UserRole;

use crate::password::PasswordHasher;

/// Create the initial admin account when no users exist.
///
/// In production mode both credentials must be configured; startup fails
/// otherwise. In development mode a missing pair only produces a warning
/// and the instance comes up without any account.
pub async fn ensure_admin(
    users: &UserRepository,
    hasher: &PasswordHasher,
    config: &AuthConfig,
) -> Result<(), AppError> {
    if users.count().await? > 0 {
        return Ok(());
    }

    let creds = config
        .admin_username
        .as_deref()
        .zip(config.admin_password.as_deref());

    match creds {
        Some((username, password)) => {
            let hash = hasher.hash_password(password)?;
            let user = users.create(username, &hash, UserRole::Admin).await?;
            info!(user_id = %user.id, username = %username, "Created initial admin account");
            Ok(())
        }
        None if config.production => Err(AppError::configuration(
            "No users exist and admin credentials are not configured; \
             set auth.admin_username and auth.admin_password",
        )),
        None => {
            warn!("No users exist and no admin credentials configured; login will be impossible");
            Ok(())
        }
    }
}
