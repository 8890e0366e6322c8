//! Write executor: runs a canonical request against the store
//!
//! Re-attaches the id to the filter and calls the store. Store errors come
//! back untouched; deciding what happens after a write is the caller's job.

use crate::document::Document;
use crate::request::OpRequest;
use crate::store::{DocumentStore, FindAndModifyOptions, UpdateOutcome};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

/// Issues writes for one collection
#[derive(Clone)]
pub struct WriteExecutor {
    store: Arc<dyn DocumentStore>,
    collection: Arc<str>,
}

impl WriteExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn update(&self, request: &OpRequest) -> Result<UpdateOutcome> {
        let outcome = self
            .store
            .update(&self.collection, &request.store_filter(), &request.operation)
            .await?;
        debug!(
            collection = %self.collection,
            id = %request.id,
            matched = outcome.matched,
            modified = outcome.modified,
            "Update acknowledged"
        );
        Ok(outcome)
    }

    pub async fn find_and_modify(
        &self,
        request: &OpRequest,
        options: FindAndModifyOptions,
    ) -> Result<Option<Document>> {
        let document = self
            .store
            .find_and_modify(
                &self.collection,
                &request.store_filter(),
                &request.operation,
                options,
            )
            .await?;
        debug!(
            collection = %self.collection,
            id = %request.id,
            found = document.is_some(),
            "findAndModify acknowledged"
        );
        Ok(document)
    }
}
