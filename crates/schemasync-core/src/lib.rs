//! # schemasync-core
//!
//! Core crate for SchemaSync presence. Contains the session model,
//! presence events, configuration schemas, typed identifiers, the
//! store/access traits, and the unified error system.
//!
//! This crate has **no** internal dependencies on other SchemaSync crates.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
