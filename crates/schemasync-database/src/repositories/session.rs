//! PostgreSQL-backed session store.
//!
//! Every mutation is a single-row conditional `UPDATE`, so concurrent
//! updates to different sessions never contend and the active flag can
//! only ever be cleared once.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use schemasync_core::error::{AppError, ErrorKind};
use schemasync_core::model::Session;
use schemasync_core::result::AppResult;
use schemasync_core::traits::SessionStore;
use schemasync_core::types::id::{ProjectId, SessionId, UserId};

/// Session store over the `collab_sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Distinguish "already inactive" from "never existed".
    async fn exists(&self, session_id: SessionId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM collab_sessions WHERE id = $1)")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up session", e))
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        color: &str,
    ) -> AppResult<Session> {
        let session = Session::new(project_id, user_id, color);
        sqlx::query_as::<_, Session>(
            "INSERT INTO collab_sessions (id, project_id, user_id, color, is_active, last_ping_at, joined_at) \
             VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW()) RETURNING *",
        )
        .bind(session.id)
        .bind(session.project_id)
        .bind(session.user_id)
        .bind(&session.color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create session", e))
    }

    async fn find_by_id(&self, session_id: SessionId) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM collab_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    async fn update_cursor(&self, session_id: SessionId, x: f64, y: f64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE collab_sessions \
             SET cursor_x = $2, cursor_y = $3, last_ping_at = GREATEST(last_ping_at, NOW()) \
             WHERE id = $1 AND is_active",
        )
        .bind(session_id)
        .bind(x)
        .bind(y)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update cursor", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::session_not_found(format!(
                "Session {session_id} is not active"
            )));
        }
        Ok(())
    }

    async fn heartbeat(&self, session_id: SessionId) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE collab_sessions SET last_ping_at = GREATEST(last_ping_at, NOW()) \
             WHERE id = $1 AND is_active",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record heartbeat", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::session_not_found(format!(
                "Session {session_id} is not active"
            )));
        }
        Ok(())
    }

    async fn set_inactive(&self, session_id: SessionId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE collab_sessions SET is_active = FALSE, left_at = NOW() \
             WHERE id = $1 AND is_active",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to deactivate session", e)
        })?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        if self.exists(session_id).await? {
            debug!(%session_id, "Session already inactive");
            Ok(false)
        } else {
            Err(AppError::session_not_found(format!(
                "Session {session_id} does not exist"
            )))
        }
    }

    async fn reap_if_stale(&self, session_id: SessionId, threshold: Duration) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE collab_sessions SET is_active = FALSE, left_at = NOW() \
             WHERE id = $1 AND is_active AND last_ping_at < NOW() - make_interval(secs => $2)",
        )
        .bind(session_id)
        .bind(threshold.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reap session", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_active_by_project(&self, project_id: ProjectId) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM collab_sessions WHERE project_id = $1 AND is_active \
             ORDER BY joined_at ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list active sessions", e)
        })
    }

    async fn list_stale(&self, threshold: Duration) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM collab_sessions \
             WHERE is_active AND last_ping_at < NOW() - make_interval(secs => $1) \
             ORDER BY last_ping_at ASC",
        )
        .bind(threshold.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list stale sessions", e))
    }
}
