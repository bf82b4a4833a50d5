//! Local presence fan-out: hub, per-project view, cursor rate cap.

pub mod hub;
pub mod snapshot;
pub mod throttle;

pub use hub::LocalPresenceHub;
pub use snapshot::{ProjectSnapshot, SessionPresence};
pub use throttle::{Admission, CursorThrottle};
