//! Op event types and the remote wire payload

use crate::document::{DocumentId, Filter, OperationSpec};
use serde::{Deserialize, Serialize};

/// An op event, emitted after a successful update / findAndModify
///
/// Delivered to the local listeners of the originating collection and
/// published on the remote channel named after `id`. Must be Clone for
/// `tokio::sync::broadcast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpEvent {
    /// Canonical id of the updated document; also the remote channel name
    pub id: DocumentId,
    /// Match conditions besides the id (never contains `_id`)
    pub filter: Filter,
    /// The operation as sent to the store
    pub operation: OperationSpec,
}

impl OpEvent {
    pub fn new(id: DocumentId, filter: Filter, operation: OperationSpec) -> Self {
        Self {
            id,
            filter,
            operation,
        }
    }

    /// Remote channel this event is published on
    pub fn channel(&self) -> &str {
        self.id.as_str()
    }

    /// Wire payload for the remote channel: `[filter, operation]`.
    ///
    /// The id is not part of the payload; it is the channel name.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&(&self.filter, &self.operation))
    }
}

/// Decoded remote payload: the `[filter, operation]` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOp(pub Filter, pub OperationSpec);

impl RemoteOp {
    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    pub fn filter(&self) -> &Filter {
        &self.0
    }

    pub fn operation(&self) -> &OperationSpec {
        &self.1
    }

    /// Rebuild the full event, given the channel the payload arrived on
    pub fn into_event(self, channel: &str) -> OpEvent {
        OpEvent::new(DocumentId::from(channel), self.0, self.1)
    }
}
