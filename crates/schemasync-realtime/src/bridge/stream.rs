//! Adapts in-process broadcast receivers into presence streams.

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use schemasync_core::events::PresenceEvent;

use super::PresenceStream;

/// Turn a broadcast receiver into a stream that ends when the sender is gone.
///
/// A lagging receiver skips what it missed; presence is last-value-wins.
pub(crate) fn broadcast_stream(rx: broadcast::Receiver<PresenceEvent>) -> PresenceStream {
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Presence subscriber lagged, skipping missed events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
