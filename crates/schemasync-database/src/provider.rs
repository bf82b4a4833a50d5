//! Selects the session store backend from configuration.

use std::sync::Arc;

use tracing::info;

use schemasync_core::config::DatabaseConfig;
use schemasync_core::error::AppError;
use schemasync_core::result::AppResult;
use schemasync_core::traits::SessionStore;

use crate::memory::MemorySessionStore;
use crate::repositories::PgSessionStore;

/// Build the configured session store.
///
/// The PostgreSQL backend connects and applies migrations before returning.
pub async fn build_session_store(config: &DatabaseConfig) -> AppResult<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config.store.as_str() {
        "postgres" => {
            info!("Initializing PostgreSQL session store");
            let pool = crate::connection::connect(config).await?;
            crate::migration::run_migrations(&pool).await?;
            Arc::new(PgSessionStore::new(pool))
        }
        "memory" => {
            info!("Initializing in-memory session store");
            Arc::new(MemorySessionStore::new())
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown session store: '{other}'. Supported: postgres, memory"
            )));
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use schemasync_core::error::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_memory_store_selected() {
        let config = DatabaseConfig {
            store: "memory".to_string(),
            ..DatabaseConfig::default()
        };
        let store = build_session_store(&config).await.unwrap();
        assert!(format!("{store:?}").contains("MemorySessionStore"));
    }

    #[tokio::test]
    async fn test_unknown_store_rejected() {
        let config = DatabaseConfig {
            store: "sqlite".to_string(),
            ..DatabaseConfig::default()
        };
        let err = build_session_store(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
