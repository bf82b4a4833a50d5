//! Events exchanged between application instances.
//!
//! Presence events travel over the presence bus and are fanned out by
//! each instance's local hub to the browser clients of a project.

pub mod presence;

pub use presence::{PresenceEvent, PresenceEventKind};
