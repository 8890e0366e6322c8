//! NATS-based op publisher for inter-process op delivery
//!
//! Each document has its own subject, named exactly like the document's
//! canonical id; every message on it is a JSON `[filter, operation]` pair.
//! Processes interested in one document subscribe to that subject only.

use super::publisher::Publisher;
use super::types::{OpEvent, RemoteOp};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

/// Publisher backed by a NATS client
#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying NATS client.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Subscribe to the raw op channel of one document.
    ///
    /// Each message payload is a JSON-serialized `[filter, operation]`.
    pub async fn subscribe_channel(&self, channel: &str) -> anyhow::Result<async_nats::Subscriber> {
        let subscriber = self
            .client
            .subscribe(channel.to_string())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to subscribe to NATS channel {}: {}", channel, e))?;
        debug!(channel = %channel, "Subscribed to NATS op channel");
        Ok(subscriber)
    }

    /// Subscribe to the ops of one document, decoded.
    ///
    /// Messages that do not decode as `[filter, operation]` are logged and
    /// skipped.
    pub async fn subscribe_ops(
        &self,
        channel: &str,
    ) -> anyhow::Result<impl Stream<Item = OpEvent> + Send + Unpin> {
        let subscriber = self.subscribe_channel(channel).await?;
        Ok(subscriber.filter_map(|msg| async move {
            match RemoteOp::from_payload(&msg.payload) {
                Ok(op) => Some(op.into_event(msg.subject.as_str())),
                Err(e) => {
                    warn!(
                        channel = %msg.subject,
                        "Failed to decode op payload from NATS: {}",
                        e
                    );
                    None
                }
            }
        }).boxed())
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        self.client
            .publish(channel.to_string(), payload.into())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to publish op to NATS channel {}: {}", channel, e))
    }
}

/// Connect to a NATS server.
///
/// Returns a connected `async_nats::Client` ready for publishing and subscribing.
pub async fn connect_nats(url: &str) -> anyhow::Result<async_nats::Client> {
    let client = async_nats::connect(url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to NATS at {}: {}", url, e))?;
    tracing::info!("Connected to NATS at {}", url);
    Ok(client)
}
