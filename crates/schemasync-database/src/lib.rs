//! # schemasync-database
//!
//! Session store implementations: PostgreSQL (via sqlx) for fleet
//! deployments and an in-process map for single-node runs and tests.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod provider;
pub mod repositories;

pub use memory::MemorySessionStore;
pub use provider::build_session_store;
pub use repositories::PgSessionStore;
