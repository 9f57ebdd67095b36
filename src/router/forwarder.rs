//! Background terminal forwarding.
//!
//! Inbound peer messages bound for the local terminal are queued here and
//! delivered off the request path. Delivery failure is logged, never
//! propagated: the peer's acknowledgment must not wait on the terminal.

use crate::core::Message;
use crate::router::collaborators::PeerTransport;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

struct Forward {
    url: String,
    message: Message,
}

/// Fire-and-forget delivery queue backed by a worker task.
pub struct TerminalForwarder {
    tx: mpsc::UnboundedSender<Forward>,
}

impl TerminalForwarder {
    /// Spawn the worker task. Must be called within a Tokio runtime.
    pub fn spawn(transport: Arc<dyn PeerTransport>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Forward>();
        tokio::spawn(async move {
            while let Some(forward) = rx.recv().await {
                if let Err(e) = transport.deliver(&forward.url, &forward.message).await {
                    warn!(url = %forward.url, error = %e, "terminal forward failed");
                }
            }
        });
        Self { tx }
    }

    /// Queue `message` for delivery to `url` without waiting.
    pub fn forward(&self, url: &str, message: Message) {
        // The worker only stops when the forwarder is dropped; a send error
        // here means shutdown is underway and the forward can be discarded.
        let _ = self.tx.send(Forward {
            url: url.to_string(),
            message,
        });
    }
}
