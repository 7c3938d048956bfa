//! Mirror of a single document.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::status::{MemoryStatus, StatusPort};
use crate::store::{DocumentHandler, DocumentRef, DocumentSnapshot, DocumentStore, StoreResult};

use super::lifecycle::ListenerCore;
use super::Listener;

type UpdateCallback<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;

/// Observable state of a [`DocumentMirror`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState<T> {
    /// Last successfully decoded value.
    pub value: Option<T>,
    pub active: bool,
}

impl<T> Default for DocumentState<T> {
    fn default() -> Self {
        Self {
            value: None,
            active: false,
        }
    }
}

/// Holds the latest decoded value of one document.
///
/// A snapshot that fails to decode, including one of a document that does
/// not exist, leaves the previous value in place.
pub struct DocumentMirror<T: Entity> {
    core: Arc<ListenerCore>,
    store: Arc<dyn DocumentStore>,
    target: DocumentRef,
    state: Arc<watch::Sender<DocumentState<T>>>,
    on_update: Option<UpdateCallback<T>>,
}

impl<T: Entity> DocumentMirror<T> {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        target: DocumentRef,
    ) -> Self {
        let (state, _) = watch::channel(DocumentState::default());
        Self {
            core: Arc::new(ListenerCore::new(name, Arc::new(MemoryStatus::new()))),
            store,
            target,
            state: Arc::new(state),
            on_update: None,
        }
    }

    pub fn with_status(mut self, status: Arc<dyn StatusPort>) -> Self {
        let name = self.core.name().to_string();
        self.core = Arc::new(ListenerCore::new(name, status));
        self
    }

    /// Called with the held value after every delivered snapshot.
    pub fn on_update(mut self, callback: impl Fn(Option<&T>) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(callback));
        self
    }

    pub fn target(&self) -> &DocumentRef {
        &self.target
    }

    pub fn value(&self) -> Option<T> {
        self.state.borrow().value.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn state(&self) -> DocumentState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DocumentState<T>> {
        self.state.subscribe()
    }

    fn handler(&self, generation: u64) -> DocumentHandler {
        let core = Arc::downgrade(&self.core);
        let state = Arc::clone(&self.state);
        let on_update = self.on_update.clone();

        Arc::new(move |result: StoreResult<DocumentSnapshot>| {
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
                let mut failure = None;
                let mut activated = false;
                state.send_modify(|state| {
                    match T::from_snapshot(&snapshot) {
                        Ok(value) => state.value = Some(value),
                        Err(e) => failure = Some(e),
                    }
                    activated = !state.active;
                    state.active = true;
                });
                (failure, activated)
            });
            let Some((failure, activated)) = applied else {
                debug!("{}: dropping snapshot for a released listener", core.name());
                return;
            };

            if let Some(e) = failure {
                warn!("{}: keeping previous value: {}", core.name(), e);
            }
            if activated {
                core.report_active();
            }
            if let Some(callback) = &on_update {
                let value = state.borrow().value.clone();
                callback(value.as_ref());
            }
        })
    }
}

impl<T: Entity> Listener for DocumentMirror<T> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn start(&self) {
        self.core.start(self.target.is_empty(), |generation| {
            self.store
                .listen_document(&self.target, self.handler(generation))
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
