//! Mirror of a query's result set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::status::{MemoryStatus, StatusPort};
use crate::store::{DocumentStore, Query, QueryHandler, QuerySnapshot, StoreResult};

use super::lifecycle::ListenerCore;
use super::reconcile::apply_changes;
use super::Listener;

type UpdateCallback<T> = Arc<dyn Fn(&[T]) + Send + Sync>;

/// Observable state of a [`CollectionMirror`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<T> {
    /// Mirrored entities in result order.
    pub items: Vec<T>,
    /// Set once the first batch (possibly empty) has been applied.
    pub active: bool,
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            active: false,
        }
    }
}

/// Keeps an ordered list of entities in sync with a query.
///
/// ```ignore
/// let mirror = CollectionMirror::<Profile>::new("profiles", store, query)
///     .on_update(|items| println!("{} profiles", items.len()));
/// mirror.start();
/// ```
pub struct CollectionMirror<T: Entity> {
    core: Arc<ListenerCore>,
    store: Arc<dyn DocumentStore>,
    query: Query,
    state: Arc<watch::Sender<CollectionState<T>>>,
    on_update: Option<UpdateCallback<T>>,
}

impl<T: Entity> CollectionMirror<T> {
    pub fn new(name: impl Into<String>, store: Arc<dyn DocumentStore>, query: Query) -> Self {
        let (state, _) = watch::channel(CollectionState::default());
        Self {
            core: Arc::new(ListenerCore::new(name, Arc::new(MemoryStatus::new()))),
            store,
            query,
            state: Arc::new(state),
            on_update: None,
        }
    }

    /// Reports activity to `status` instead of a private in-memory record.
    pub fn with_status(mut self, status: Arc<dyn StatusPort>) -> Self {
        let name = self.core.name().to_string();
        self.core = Arc::new(ListenerCore::new(name, status));
        self
    }

    /// Called with the full list once per applied batch.
    pub fn on_update(mut self, callback: impl Fn(&[T]) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(callback));
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn state(&self) -> CollectionState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionState<T>> {
        self.state.subscribe()
    }

    fn handler(&self, generation: u64) -> QueryHandler {
        let core = Arc::downgrade(&self.core);
        let state = Arc::clone(&self.state);
        let on_update = self.on_update.clone();
        // The first batch of a registration describes the whole result set.
        let initial = AtomicBool::new(true);

        Arc::new(move |result: StoreResult<QuerySnapshot>| {
            let Some(core) = core.upgrade() else {
                return;
            };
            let snapshot = match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("{}: listener error: {}", core.name(), e);
                    return;
                }
            };

            let applied = core.run_current(generation, || {
                let mut errors = Vec::new();
                let mut activated = false;
                state.send_modify(|state| {
                    if initial.swap(false, Ordering::SeqCst) {
                        state.items.clear();
                    }
                    errors = apply_changes(&mut state.items, &snapshot.changes);
                    activated = !state.active;
                    state.active = true;
                });
                (errors, activated)
            });
            let Some((errors, activated)) = applied else {
                debug!("{}: dropping batch for a released listener", core.name());
                return;
            };

            for e in &errors {
                warn!("{}: skipped change: {}", core.name(), e);
            }
            if activated {
                core.report_active();
            }
            if let Some(callback) = &on_update {
                let items = state.borrow().items.clone();
                callback(&items);
            }
        })
    }
}

impl<T: Entity> Listener for CollectionMirror<T> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn start(&self) {
        self.core.start(self.query.is_empty(), |generation| {
            self.store.listen_query(&self.query, self.handler(generation))
        });
    }

    fn stop(&self) {
        self.core.stop();
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.active, false));
    }

    fn is_listening(&self) -> bool {
        self.core.is_registered()
    }
}
