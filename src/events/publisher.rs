//! Remote publish transport
//!
//! A [`Publisher`] pushes a payload onto a named channel. Publishing is
//! best-effort: the dispatcher logs a failed publish and moves on, so an
//! error here never reaches the caller of the write.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

/// Default per-channel buffer of the in-process broker
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Pub/sub transport used for remote op delivery
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `channel`. Having no subscriber is not an error.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> anyhow::Result<()>;
}

/// In-process pub/sub broker.
///
/// Lets several database sessions in one process exchange ops without an
/// external server, and lets tests observe exactly what went over the wire.
pub struct MemoryBroker {
    channels: DashMap<String, broadcast::Sender<Vec<u8>>>,
    capacity: usize,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broker whose channels buffer up to `capacity` messages
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a channel. Only payloads published after this call are
    /// received.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Vec<u8>> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of channels currently held by the broker
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of live subscribers on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |sender| sender.receiver_count())
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryBroker {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        let sent = match self.channels.get(channel) {
            Some(sender) => sender.send(payload).ok(),
            None => {
                debug!(channel = %channel, "No subscriber on channel, payload dropped");
                return Ok(());
            }
        };
        match sent {
            Some(n) => debug!(channel = %channel, subscribers = n, "Payload published"),
            None => {
                // Every receiver is gone: forget the channel
                self.channels
                    .remove_if(channel, |_, sender| sender.receiver_count() == 0);
                debug!(channel = %channel, "Subscribers gone, payload dropped");
            }
        }
        Ok(())
    }
}
