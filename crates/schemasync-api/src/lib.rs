//! # schemasync-api
//!
//! Axum HTTP surface for SchemaSync presence: instance health with bus
//! mode and presence counters, and the active collaborators of a project.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
