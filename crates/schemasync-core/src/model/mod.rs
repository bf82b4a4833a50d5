//! Persistent record types shared by the store implementations.

pub mod session;

pub use session::Session;
