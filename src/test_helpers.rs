//! Test helper factories and mock database builders
//!
//! Provides convenience functions for creating test objects with sensible defaults,
//! and helpers for building in-memory `Database` instances.
#![allow(dead_code)]

use crate::document::{DocumentId, Filter};
use crate::events::{MemoryBroker, OpEvent, Publisher};
use crate::store::MemoryStore;
use crate::{Collection, Database};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Object factories
// ============================================================================

/// Unwrap a `json!` object literal into a map
pub fn obj(value: Value) -> Filter {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// An op on `id` with an empty filter and an empty `$set`
pub fn op_event(id: &str) -> OpEvent {
    OpEvent::new(
        DocumentId::new(id),
        Filter::new(),
        obj(serde_json::json!({"$set": {}})),
    )
}

// ============================================================================
// Mock database builders
// ============================================================================

/// Local-only database over an empty in-memory store
pub fn mock_database() -> Database {
    Database::new("test", Arc::new(MemoryStore::new()))
}

/// Database publishing to an in-memory broker
pub fn mock_database_with_broker() -> (Database, Arc<MemoryBroker>) {
    let broker = Arc::new(MemoryBroker::new());
    let db = Database::with_publisher("test", Arc::new(MemoryStore::new()), broker.clone());
    (db, broker)
}

/// Record every op delivered to `collection`
pub fn collect_ops(collection: &Collection) -> Arc<Mutex<Vec<OpEvent>>> {
    let ops = Arc::new(Mutex::new(Vec::new()));
    let sink = ops.clone();
    collection.on(move |event| sink.lock().unwrap().push(event.clone()));
    ops
}

// ============================================================================
// Publishers
// ============================================================================

/// Publisher whose every publish fails
#[derive(Default)]
pub struct FailingPublisher {
    attempts: AtomicUsize,
}

impl FailingPublisher {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, channel: &str, _payload: Vec<u8>) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("broker down, cannot publish to {}", channel)
    }
}
