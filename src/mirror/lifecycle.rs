//! Lifecycle shared by every mirror kind.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::status::StatusPort;
use crate::store::ListenerRegistration;

#[derive(Default)]
struct Slot {
    registration: Option<ListenerRegistration>,
    /// Bumped by every start and stop. Deliveries carry the generation
    /// they were registered under and are dropped once it is stale.
    generation: u64,
    /// A start is between allocating its generation and storing its
    /// registration.
    starting: bool,
}

/// Holds the subscription of one mirror and reports its activity.
///
/// Backends may deliver the first snapshot from inside the registering
/// call, so the slot lock is never held while registering.
pub(crate) struct ListenerCore {
    name: String,
    slot: Mutex<Slot>,
    status: Arc<dyn StatusPort>,
}

impl ListenerCore {
    pub(crate) fn new(name: impl Into<String>, status: Arc<dyn StatusPort>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(Slot::default()),
            status,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.lock().registration.is_some()
    }

    /// Registers through `register` unless the target is empty or a
    /// registration already exists. `register` receives the generation its
    /// deliveries must present to [`run_current`](Self::run_current).
    pub(crate) fn start(
        &self,
        empty_target: bool,
        register: impl FnOnce(u64) -> ListenerRegistration,
    ) -> bool {
        if empty_target {
            debug!("{}: empty target, not starting", self.name);
            return false;
        }

        let generation = {
            let mut slot = self.lock();
            if slot.registration.is_some() || slot.starting {
                debug!("{}: already listening", self.name);
                return false;
            }
            slot.generation += 1;
            slot.starting = true;
            slot.generation
        };

        let registration = register(generation);

        let mut slot = self.lock();
        slot.starting = false;
        if slot.generation != generation {
            // Stopped while registering.
            drop(slot);
            registration.remove();
            return false;
        }
        slot.registration = Some(registration);
        drop(slot);

        info!("{}: listening", self.name);
        true
    }

    /// Releases the registration. Returns false if there was none.
    pub(crate) fn stop(&self) -> bool {
        let registration = {
            let mut slot = self.lock();
            slot.generation += 1;
            slot.registration.take()
        };

        self.status.set_active(&self.name, false);
        match registration {
            Some(registration) => {
                registration.remove();
                info!("{}: stopped listening", self.name);
                true
            }
            None => {
                debug!("{}: not listening, nothing to stop", self.name);
                false
            }
        }
    }

    /// Runs `apply` if `generation` is still current. The slot stays locked
    /// while `apply` runs, so a concurrent stop cannot interleave.
    pub(crate) fn run_current<R>(
        &self,
        generation: u64,
        apply: impl FnOnce() -> R,
    ) -> Option<R> {
        let slot = self.lock();
        if slot.generation != generation {
            return None;
        }
        let result = apply();
        drop(slot);
        Some(result)
    }

    pub(crate) fn report_active(&self) {
        self.status.set_active(&self.name, true);
    }
}
