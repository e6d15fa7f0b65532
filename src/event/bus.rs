//! Listener registry and fan-out.
//!
//! Publishing snapshots the listener list and releases the lock before any
//! listener runs, so listeners may publish, register or unregister from
//! inside a callback. A listener that returns an error or panics is logged
//! and skipped; the remaining listeners still receive the event.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, warn};
use uuid::Uuid;

use crate::event::GatewayEvent;
use crate::utils::Result;

/// Identifies a registration on the [`EventBus`].
pub type ListenerId = Uuid;

/// Receives every event published on the bus.
///
/// Called synchronously on the publishing task; keep it short.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &GatewayEvent) -> Result<()>;
}

impl<F> EventListener for F
where
    F: Fn(&GatewayEvent) -> Result<()> + Send + Sync,
{
    fn on_event(&self, event: &GatewayEvent) -> Result<()> {
        self(event)
    }
}

type Registration = (ListenerId, Arc<dyn EventListener>);

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Registration>>,
}

impl EventBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` and return the id to remove it with.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = Uuid::new_v4();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Returns `false` if no listener with this id was registered.
    pub fn remove_listener(&self, id: &ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| registered != id);
        listeners.len() != before
    }

    /// Keep only the listeners whose id satisfies `keep`.
    pub fn retain(&self, mut keep: impl FnMut(&ListenerId) -> bool) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| keep(id));
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn publish(&self, event: &GatewayEvent) {
        let snapshot: Vec<Registration> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(listener = %id, event = event.name(), "Listener failed: {e}");
                }
                Err(_) => {
                    error!(listener = %id, event = event.name(), "Listener panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
