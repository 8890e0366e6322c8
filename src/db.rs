//! Database session
//!
//! Owns the store, the dispatcher and the per-collection listener
//! registries. Every `get(name)` on one session (or any clone of it) returns
//! a handle sharing the same registry, so a listener registered through one
//! handle sees ops made through another. Separate sessions never share
//! registries; ops reach them through the remote channel only.

use crate::collection::Collection;
use crate::events::{connect_nats, Dispatcher, NatsPublisher, OpListeners, Publisher};
use crate::executor::WriteExecutor;
use crate::store::DocumentStore;
use crate::Config;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Database session
#[derive(Clone)]
pub struct Database {
    name: Arc<str>,
    store: Arc<dyn DocumentStore>,
    dispatcher: Dispatcher,
    listeners: Arc<DashMap<String, Arc<OpListeners>>>,
    watch_capacity: usize,
}

impl Database {
    /// Local-only session: ops reach in-process listeners only
    pub fn new(name: impl Into<Arc<str>>, store: Arc<dyn DocumentStore>) -> Self {
        Self::with_dispatcher(name, store, Dispatcher::local_only())
    }

    /// Session that also publishes every op through `publisher`
    pub fn with_publisher(
        name: impl Into<Arc<str>>,
        store: Arc<dyn DocumentStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self::with_dispatcher(name, store, Dispatcher::with_publisher(publisher))
    }

    fn with_dispatcher(
        name: impl Into<Arc<str>>,
        store: Arc<dyn DocumentStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            dispatcher,
            listeners: Arc::new(DashMap::new()),
            watch_capacity: crate::events::DEFAULT_WATCH_CAPACITY,
        }
    }

    /// Open a session as described by `config`.
    ///
    /// Connects to NATS when `nats_url` is set; otherwise the session is
    /// local-only. A configured but unreachable broker is an error.
    pub async fn connect(config: &Config, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        let db = match &config.nats_url {
            Some(url) => {
                let client = connect_nats(url).await?;
                Self::with_publisher(
                    config.database.as_str(),
                    store,
                    Arc::new(NatsPublisher::new(client)),
                )
            }
            None => {
                info!("NATS_URL not set, ops are delivered to local listeners only");
                Self::new(config.database.as_str(), store)
            }
        };
        Ok(db.watch_capacity(config.watch_capacity))
    }

    /// Capacity of the `watch()` channel of collections created from now on
    pub fn watch_capacity(mut self, capacity: usize) -> Self {
        self.watch_capacity = capacity.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether ops are also published remotely
    pub fn is_remote(&self) -> bool {
        self.dispatcher.has_remote()
    }

    /// Get a handle on a collection
    pub fn get(&self, collection: &str) -> Collection {
        let listeners = self
            .listeners
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(OpListeners::new(self.watch_capacity)))
            .clone();
        Collection::new(
            WriteExecutor::new(self.store.clone(), collection),
            listeners,
            self.dispatcher.clone(),
        )
    }

    /// Names of the collections a handle was requested for
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("remote", &self.is_remote())
            .field("collections", &self.listeners.len())
            .finish()
    }
}
