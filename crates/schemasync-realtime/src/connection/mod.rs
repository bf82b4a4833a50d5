//! Local client delivery targets.

pub mod handle;
pub mod sink;

pub use handle::ClientConnection;
pub use sink::{ClientFeed, ClientSink, PushOutcome};
