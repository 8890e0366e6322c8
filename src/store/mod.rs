//! Document store interface and the in-memory backend

mod memory;
pub mod traits;
mod update;

pub use memory::MemoryStore;
pub use traits::{DocumentStore, FindAndModifyOptions, UpdateOutcome};
