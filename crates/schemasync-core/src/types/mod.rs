//! Core type definitions used across the SchemaSync workspace.

pub mod clock;
pub mod color;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use color::assign_color;
pub use id::*;
