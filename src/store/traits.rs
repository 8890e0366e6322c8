//! DocumentStore trait definition
//!
//! The driver never talks to a database directly: every read and write goes
//! through this trait, so the op pipeline can sit in front of any backend
//! (the bundled [`MemoryStore`](super::MemoryStore), a network client, a mock).

use crate::document::{Document, Filter, OperationSpec};
use crate::Result;
use async_trait::async_trait;

/// Outcome of a single-document update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter (0 or 1)
    pub matched: u64,
    /// Documents actually changed
    pub modified: u64,
}

/// Options for findAndModify
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindAndModifyOptions {
    /// Return the document after the update instead of before it
    pub return_new: bool,
}

/// Abstract interface to the document store.
///
/// Errors must be reported as `Error::StoreRejected` when the store refused
/// the operation and `Error::StoreUnavailable` when it could not be reached.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, assigning an `_id` when it has none.
    /// Returns the stored document.
    async fn insert(&self, collection: &str, document: Document) -> Result<Document>;

    /// First document matching `filter`
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Apply `update` to the first document matching `filter`.
    ///
    /// Matching nothing is not an error.
    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &OperationSpec,
    ) -> Result<UpdateOutcome>;

    /// Apply `update` to the first document matching `filter` and return it
    /// (before or after the change, per `options`). `None` when nothing matched.
    async fn find_and_modify(
        &self,
        collection: &str,
        filter: &Filter,
        update: &OperationSpec,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>>;
}
