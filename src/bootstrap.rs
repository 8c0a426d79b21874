//! One-time startup provisioning.

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;

/// Creates the configured admin account if it does not exist yet.
///
/// Explicit, idempotent setup step invoked once from `main`; safe to run on
/// every start.
pub async fn ensure_admin(pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(&config.admin_username)
        .fetch_optional(pool)
        .await?;

    match existing {
        Some(_) => tracing::debug!(username = %config.admin_username, "admin account already exists"),
        None => {
            sqlx::query("INSERT INTO users (id, username, email, role) VALUES ($1, $2, $3, 'admin')")
                .bind(Uuid::new_v4())
                .bind(&config.admin_username)
                .bind(&config.admin_email)
                .execute(pool)
                .await?;
            tracing::info!(username = %config.admin_username, "admin account created");
        }
    }
    Ok(())
}
