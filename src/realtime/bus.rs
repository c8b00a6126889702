//! Local fan-out of parsed realtime events.
//!
//! Every registration gets its own entry and its own [`Subscription`] handle,
//! so registering the same callback twice yields two deliveries and two
//! independent handles.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

use crate::realtime::event::RealtimeEvent;

pub type Listener = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.subscribe_shared(Arc::new(callback))
    }

    /// Register an already shared listener. The same `Arc` may be registered
    /// several times; each registration is a distinct entry.
    pub fn subscribe_shared(&self, listener: Listener) -> Subscription {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    /// Invoke every listener registered at the time of the call, in
    /// registration order. A listener removed by an earlier one during the
    /// same broadcast is skipped. A panicking listener is logged and skipped.
    /// Returns the number of listeners invoked.
    pub fn broadcast(&self, event: &RealtimeEvent) -> usize {
        // listeners may (un)subscribe from inside the callback
        let snapshot: Vec<(u64, Listener)> = lock(&self.registry).listeners.clone();

        let mut delivered = 0;
        for (id, listener) in &snapshot {
            if !self.is_registered(*id) {
                continue;
            }
            delivered += 1;
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                error!(
                    listener = id,
                    topic = %event.topic,
                    "realtime listener panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
        delivered
    }

    fn is_registered(&self, id: u64) -> bool {
        lock(&self.registry)
            .listeners
            .iter()
            .any(|(registered, _)| *registered == id)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle to one bus registration. Dropping it does not unsubscribe; call
/// [`Subscription::unsubscribe`].
#[must_use = "a subscription stays registered until `unsubscribe` is called"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove exactly this registration. Returns `false` if the bus is gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = lock(&registry);
        match registry.listeners.iter().position(|(id, _)| *id == self.id) {
            Some(index) => {
                registry.listeners.remove(index);
                true
            }
            None => false,
        }
    }
}
