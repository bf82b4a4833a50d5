//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod access;
pub mod bus;
pub mod database;
pub mod logging;
pub mod presence;
pub mod server;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use self::access::{AccessConfig, AccessGrant};
pub use self::bus::BusConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::presence::PresenceConfig;
pub use self::server::ServerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Presence bus transport settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Presence hub and reaper settings.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Project access gate for joins.
    #[serde(default)]
    pub access: AccessConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `SCHEMASYNC__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SCHEMASYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the presence subsystem cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.presence.heartbeat_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "presence.heartbeat_timeout_seconds must be greater than zero",
            ));
        }
        if self.presence.sweep_interval_seconds == 0 {
            return Err(AppError::configuration(
                "presence.sweep_interval_seconds must be greater than zero",
            ));
        }
        if self.presence.client_queue_capacity == 0 || self.bus.channel_buffer_size == 0 {
            return Err(AppError::configuration(
                "presence.client_queue_capacity and bus.channel_buffer_size must be greater than zero",
            ));
        }
        if !self.presence.tolerates_missed_beats() {
            warn!(
                heartbeat_interval = self.presence.heartbeat_interval_seconds,
                heartbeat_timeout = self.presence.heartbeat_timeout_seconds,
                "Heartbeat interval exceeds a third of the timeout; live sessions may be reaped"
            );
        }
        Ok(())
    }
}
