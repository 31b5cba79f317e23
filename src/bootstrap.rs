use sqlx::PgPool;
use tracing::{debug, info};

use crate::auth::password::hash_password;
use crate::config::AppConfig;
use crate::users::repo_types::{NewUser, Role, User};

/// Ensure the configured superadmin account exists. Idempotent across
/// restarts: keyed by email, and a concurrent duplicate insert is treated
/// as already-bootstrapped.
pub async fn ensure_superadmin(db: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let email = config.superadmin_email.trim().to_lowercase();

    if User::find_by_email(db, &email).await?.is_some() {
        debug!(email = %email, "superadmin already exists");
        return Ok(());
    }

    let new = NewUser {
        first_name: "Super".into(),
        last_name: "Admin".into(),
        email: email.clone(),
        password_hash: hash_password(&config.superadmin_password)?,
        mobile_number: None,
        role: Role::Superadmin,
        profile_pic: None,
    };

    match User::create(db, &new).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %email, "superadmin created");
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            // Another instance won the race; same outcome.
            debug!(email = %email, "superadmin created concurrently");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
