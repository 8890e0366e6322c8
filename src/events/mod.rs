//! Op event system
//!
//! This module provides:
//! - `OpEvent` / `RemoteOp`: the broadcast triple and its wire payload
//! - `OpListeners`: per-collection registry of local handlers
//! - `Publisher`: remote pub/sub transport (`NatsPublisher`, `MemoryBroker`)
//! - `Dispatcher`: delivers an op locally, then on the remote channel

mod dispatcher;
mod listeners;
pub mod nats;
mod publisher;
mod types;

pub use dispatcher::Dispatcher;
pub use listeners::{ListenerId, OpHandler, OpListeners, DEFAULT_WATCH_CAPACITY};
pub use nats::{connect_nats, NatsPublisher};
pub use publisher::{MemoryBroker, Publisher};
pub use types::{OpEvent, RemoteOp};
