//! Core traits defined in `schemasync-core` and implemented by other crates.

pub mod access;
pub mod presence;
pub mod session_store;

pub use access::{AllowAllAccess, ProjectAccess, StaticProjectAccess, build_project_access};
pub use presence::PresenceNotifier;
pub use session_store::SessionStore;
