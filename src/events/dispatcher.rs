//! Op dispatcher: local listeners + optional remote publisher
//!
//! Called once per successful write. Local listeners are served first, on
//! the writing task; the remote publish follows. When no publisher is
//! configured the dispatcher works in local-only mode.

use super::listeners::OpListeners;
use super::publisher::Publisher;
use super::types::OpEvent;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fans an [`OpEvent`] out to the collection's listeners and the remote channel
#[derive(Clone, Default)]
pub struct Dispatcher {
    remote: Option<Arc<dyn Publisher>>,
}

impl Dispatcher {
    /// Local-only dispatcher (no remote publishing)
    pub fn local_only() -> Self {
        Self { remote: None }
    }

    /// Dispatcher that also publishes every op on the remote channel
    pub fn with_publisher(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            remote: Some(publisher),
        }
    }

    /// Whether a remote publisher is configured
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Deliver an op. Best-effort: nothing here can fail the write that
    /// produced the event.
    pub async fn dispatch(&self, collection: &str, listeners: &OpListeners, event: OpEvent) {
        // 1. Local listeners, in registration order
        listeners.emit(&event);

        // 2. Remote channel named after the document id
        let Some(remote) = &self.remote else {
            debug!(collection = %collection, "Dispatcher: no publisher configured, local-only mode");
            return;
        };

        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    collection = %collection,
                    channel = %event.channel(),
                    "Failed to serialize op payload: {}",
                    e
                );
                return;
            }
        };

        match remote.publish(event.channel(), payload).await {
            Ok(()) => debug!(
                collection = %collection,
                channel = %event.channel(),
                "Op published"
            ),
            Err(e) => warn!(
                collection = %collection,
                channel = %event.channel(),
                "Failed to publish op: {}",
                e
            ),
        }
    }
}
