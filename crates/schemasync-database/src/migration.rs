//! Applies the bundled schema for the session table.

use sqlx::PgPool;
use tracing::info;

use schemasync_core::error::{AppError, ErrorKind};

/// Bring the `collab_sessions` schema up to date.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Applying session store migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Session store schema is up to date");
    Ok(())
}
