//! Repository implementations backed by PostgreSQL.

pub mod session;

pub use session::PgSessionStore;
