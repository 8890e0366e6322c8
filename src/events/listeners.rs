//! Local op listener registry
//!
//! One registry exists per (database session, collection name). Handlers are
//! kept in registration order and flagged persistent or one-shot.
//!
//! Dispatch works on a snapshot of the handler list taken when the pass
//! starts, so handlers may register or unregister listeners (themselves
//! included) while being called:
//! - handlers added during a pass first fire on the next pass;
//! - handlers removed during a pass do not fire for the rest of that pass;
//! - a one-shot handler fires at most once, even across concurrent passes.

use super::types::OpEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// Default capacity of the `watch()` broadcast channel
pub const DEFAULT_WATCH_CAPACITY: usize = 1024;

/// Handle returned by `on` / `once`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Signature of an op handler.
///
/// Any `Fn(&OpEvent) + Send + Sync` closure implements this trait.
pub trait OpHandler: Send + Sync + Fn(&OpEvent) {}

impl<F> OpHandler for F where F: Send + Sync + Fn(&OpEvent) {}

#[derive(Clone)]
struct Entry {
    id: ListenerId,
    once: bool,
    handler: Arc<dyn OpHandler>,
}

/// Ordered registry of op handlers for one collection
pub struct OpListeners {
    entries: RwLock<Vec<Entry>>,
    next_id: AtomicU64,
    watch: broadcast::Sender<OpEvent>,
}

impl OpListeners {
    pub fn new(watch_capacity: usize) -> Self {
        let (watch, _) = broadcast::channel(watch_capacity.max(1));
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            watch,
        }
    }

    /// Register a handler called for every op
    pub fn on<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&OpEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(handler), false)
    }

    /// Register a handler called for the next op only
    pub fn once<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&OpEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(handler), true)
    }

    /// Unregister a handler. Returns false if it was not registered (or a
    /// one-shot handler already fired).
    pub fn off(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|e| e.id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive ops as a stream (for async consumers)
    pub fn watch(&self) -> broadcast::Receiver<OpEvent> {
        self.watch.subscribe()
    }

    /// Deliver an event to every handler, in registration order.
    ///
    /// Runs the handlers on the calling task, before returning. Returns the
    /// number of handlers called.
    pub fn emit(&self, event: &OpEvent) -> usize {
        let snapshot: Vec<Entry> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut called = 0;
        for entry in snapshot {
            if !self.claim(&entry) {
                continue;
            }
            (entry.handler)(event);
            called += 1;
        }

        // No watchers is fine
        let watchers = self.watch.send(event.clone()).unwrap_or(0);
        debug!(
            id = %event.id,
            handlers = called,
            watchers,
            "Op event delivered locally"
        );
        called
    }

    fn register(&self, handler: Arc<dyn OpHandler>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry { id, once, handler });
        id
    }

    /// Whether the entry may fire now: persistent handlers must still be
    /// registered, one-shot handlers are removed here
    fn claim(&self, entry: &Entry) -> bool {
        if entry.once {
            self.off(entry.id)
        } else {
            self.entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|e| e.id == entry.id)
        }
    }
}

impl Default for OpListeners {
    fn default() -> Self {
        Self::new(DEFAULT_WATCH_CAPACITY)
    }
}
