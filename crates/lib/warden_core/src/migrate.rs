//! Database migration support.
//!
//! Embeds and runs SQL migrations from `warden_core/migrations/`.

use sqlx::PgPool;

/// Run all embedded migrations (users, refresh_tokens).
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
