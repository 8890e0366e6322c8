//! Collection handle
//!
//! Bound to one named collection of a [`Database`](crate::Database) session.
//! `update` and `find_and_modify` go through normalization, the write
//! executor and, only when the store acknowledged the write, the dispatcher.
//! A failed write returns its error and broadcasts nothing.

use crate::document::{Document, DocumentId, Filter};
use crate::events::{Dispatcher, ListenerId, OpEvent, OpListeners};
use crate::executor::WriteExecutor;
use crate::request::{FindAndModify, OpRequest};
use crate::selector::Selector;
use crate::store::UpdateOutcome;
use crate::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Handle on one collection. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Collection {
    executor: WriteExecutor,
    listeners: Arc<OpListeners>,
    dispatcher: Dispatcher,
}

impl Collection {
    pub(crate) fn new(
        executor: WriteExecutor,
        listeners: Arc<OpListeners>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            executor,
            listeners,
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        self.executor.collection()
    }

    // ========================================================================
    // Store passthrough (no op event)
    // ========================================================================

    /// Insert a document. Inserts are not ops: nothing is broadcast.
    pub async fn insert(&self, document: Value) -> Result<Document> {
        let document = crate::document::into_object(document, "document")?;
        self.executor.store().insert(self.name(), document).await
    }

    /// Find a document by id, id string or filter containing `_id`
    pub async fn find_one(&self, selector: impl Into<Selector>) -> Result<Option<Document>> {
        let (id, filter) = selector.into().split()?;
        let request = OpRequest {
            id,
            filter,
            operation: Default::default(),
        };
        self.executor
            .store()
            .find_one(self.name(), &request.store_filter())
            .await
    }

    /// Find a document with an arbitrary filter (no id required)
    pub async fn find_one_by(&self, filter: Filter) -> Result<Option<Document>> {
        self.executor.store().find_one(self.name(), &filter).await
    }

    // ========================================================================
    // Ops
    // ========================================================================

    /// `update(identifierOrFilter, operation)`.
    ///
    /// The selector may be a [`DocumentId`], its string form, or a filter
    /// with `_id`. On success the op is broadcast before this returns.
    pub async fn update(
        &self,
        selector: impl Into<Selector>,
        operation: Value,
    ) -> Result<UpdateOutcome> {
        self.apply_update(OpRequest::update(selector, operation)?)
            .await
    }

    /// Run an already normalized update request
    pub async fn apply_update(&self, request: OpRequest) -> Result<UpdateOutcome> {
        let outcome = self.executor.update(&request).await?;
        self.broadcast(request.into_event()).await;
        Ok(outcome)
    }

    /// `findAndModify(identifierOrFilter, update)`.
    ///
    /// Returns the matched document as it was before the update.
    pub async fn find_and_modify(
        &self,
        selector: impl Into<Selector>,
        update: Value,
    ) -> Result<Option<Document>> {
        self.apply_find_and_modify(FindAndModify::new(selector, update)?)
            .await
    }

    /// `findAndModify({query, update, new})`
    pub async fn find_and_modify_with(&self, options: Value) -> Result<Option<Document>> {
        self.apply_find_and_modify(FindAndModify::from_options(options)?)
            .await
    }

    /// Run an already normalized findAndModify call
    pub async fn apply_find_and_modify(&self, call: FindAndModify) -> Result<Option<Document>> {
        let FindAndModify { request, options } = call;
        let document = self.executor.find_and_modify(&request, options).await?;
        self.broadcast(request.into_event()).await;
        Ok(document)
    }

    async fn broadcast(&self, event: OpEvent) {
        self.dispatcher
            .dispatch(self.name(), &self.listeners, event)
            .await;
    }

    // ========================================================================
    // Local op listeners
    // ========================================================================

    /// Call `handler` for every op on this collection
    pub fn on<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&OpEvent) + Send + Sync + 'static,
    {
        self.listeners.on(handler)
    }

    /// Call `handler` for the next op on this collection only
    pub fn once<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&OpEvent) + Send + Sync + 'static,
    {
        self.listeners.once(handler)
    }

    /// Unregister a handler
    pub fn off(&self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    /// Number of registered handlers
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Stream of ops on this collection
    pub fn watch(&self) -> broadcast::Receiver<OpEvent> {
        self.listeners.watch()
    }

    /// Whether two handles share one listener registry
    pub fn shares_listeners_with(&self, other: &Collection) -> bool {
        Arc::ptr_eq(&self.listeners, &other.listeners)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name())
            .field("listeners", &self.listeners.len())
            .field("remote", &self.dispatcher.has_remote())
            .finish()
    }
}
