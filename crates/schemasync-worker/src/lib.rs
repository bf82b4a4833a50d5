//! # schemasync-worker
//!
//! Background tasks for SchemaSync presence:
//!
//! - Liveness reaper that ends sessions whose clients went silent

pub mod reaper;

pub use reaper::{LivenessReaper, SweepReport};
