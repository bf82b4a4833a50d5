//! SchemaSync presence server.
//!
//! Wires the session store, presence bus, presence hub, liveness reaper,
//! and HTTP surface together and runs until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use schemasync_core::config::AppConfig;
use schemasync_core::error::AppError;
use schemasync_realtime::LocalPresenceHub;
use schemasync_worker::LivenessReaper;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` files and `SCHEMASYNC__*` variables
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("SCHEMASYNC_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting SchemaSync presence v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Session store ────────────────────────────────────
    tracing::info!("Initializing session store ({})...", config.database.store);
    let store = schemasync_database::provider::build_session_store(&config.database).await?;

    // ── Step 2: Presence bus ─────────────────────────────────────
    tracing::info!("Initializing presence bus ({})...", config.bus.provider);
    let bus = schemasync_realtime::connect_bus(&config.bus).await?;
    tracing::info!("Presence bus mode: {}", bus.mode());

    // ── Step 3: Presence hub ─────────────────────────────────────
    tracing::info!("Initializing project access gate ({})...", config.access.mode);
    let access = schemasync_core::traits::build_project_access(&config.access)?;
    let hub = LocalPresenceHub::new(
        Arc::clone(&store),
        bus,
        access,
        config.presence.clone(),
    );

    // ── Step 4: Liveness reaper ──────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = Arc::new(LivenessReaper::new(
        Arc::clone(&store),
        hub.clone(),
        &config.presence,
    ));
    let reaper_handle = reaper.spawn(shutdown_rx);

    // ── Step 5: HTTP server ──────────────────────────────────────
    let app_state = schemasync_api::AppState::new(Arc::new(config.clone()), Arc::clone(&hub));
    let app = schemasync_api::build_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("SchemaSync server listening on {}", addr);

    // ── Step 6: Graceful shutdown ────────────────────────────────
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Waiting for background tasks to complete...");
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let _ = tokio::time::timeout(grace, reaper_handle).await;
    hub.shutdown();

    tracing::info!("SchemaSync server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
