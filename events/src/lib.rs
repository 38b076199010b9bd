//! Publish/subscribe event bus.
//!
//! The bus is a cheap-to-clone handle around a shared listener table keyed by
//! event name. Dispatch is synchronous: [`EventBus::emit`] calls every current
//! subscriber before returning.
//!
//! # Reentrancy
//!
//! `emit` iterates over a snapshot of the listener list and never holds the
//! table lock while a callback runs, so callbacks may freely subscribe,
//! unsubscribe, or emit again. Listeners carry two flags:
//!
//! - `removed` is set by `off`/`unsubscribe`; a removed listener that is still
//!   in an in-flight snapshot is skipped.
//! - `fired` is claimed atomically by once-listeners before invocation, so a
//!   once-listener runs at most once even under re-entrant dispatch.
//!
//! Spent once-listeners are removed from the table only after the whole
//! snapshot has been delivered.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub use atlas_types::Event;

/// Shared callback type. Keep a clone to remove the listener with [`EventBus::off`].
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    id: u64,
    callback: Callback,
    once: bool,
    fired: AtomicBool,
    removed: AtomicBool,
}

#[derive(Default)]
struct Inner {
    listeners: Mutex<HashMap<String, Vec<Arc<Listener>>>>,
    next_id: AtomicU64,
    debug: AtomicBool,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Vec<Arc<Listener>>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove listeners matching `pred` from `event`, dropping the key when empty.
    fn remove_where(
        &self,
        event: &str,
        mut pred: impl FnMut(&Listener) -> bool,
        first_only: bool,
    ) -> usize {
        let mut table = self.table();
        let Some(list) = table.get_mut(event) else {
            return 0;
        };

        let mut removed = 0;
        list.retain(|listener| {
            if (first_only && removed > 0) || !pred(listener) {
                return true;
            }
            listener.removed.store(true, Ordering::Release);
            removed += 1;
            false
        });

        if list.is_empty() {
            table.remove(event);
        }
        removed
    }
}

/// Handle returned by every subscription.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    bus: Weak<Inner>,
    event: String,
    id: u64,
}

impl Subscription {
    /// Remove exactly the listener this handle was created for.
    ///
    /// Returns `false` if it was already removed (or was a once-listener that fired).
    pub fn unsubscribe(self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        let id = self.id;
        bus.remove_where(&self.event, |l| l.id == id, true) > 0
    }

    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Process-wide publish/subscribe bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self.inner.table().len();
        f.debug_struct("EventBus").field("events", &events).finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every emitted event at `debug` level.
    pub fn set_debug(&self, debug: bool) {
        self.inner.debug.store(debug, Ordering::Relaxed);
    }

    /// Subscribe `callback` to `event`.
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(event, Arc::new(callback), false)
    }

    /// Subscribe `callback` to the next delivery of `event` only.
    pub fn once<F>(&self, event: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(event, Arc::new(callback), true)
    }

    /// Subscribe a shared callback. The same `Arc` can later be passed to [`off`](Self::off).
    pub fn subscribe(
        &self,
        event: impl Into<String>,
        callback: Callback,
        once: bool,
    ) -> Subscription {
        let event = event.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener {
            id,
            callback,
            once,
            fired: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        });

        self.inner
            .table()
            .entry(event.clone())
            .or_default()
            .push(listener);

        Subscription {
            bus: Arc::downgrade(&self.inner),
            event,
            id,
        }
    }

    /// Remove the first listener of `event` registered with this exact callback.
    ///
    /// Returns `true` if a listener was removed.
    pub fn off(&self, event: &str, callback: &Callback) -> bool {
        let target = Arc::as_ptr(callback);
        self.inner.remove_where(
            event,
            |l| ptr::addr_eq(Arc::as_ptr(&l.callback), target),
            true,
        ) > 0
    }

    /// Deliver `event` to every current subscriber of `event.name()`.
    ///
    /// A panicking callback is logged and skipped; it never prevents delivery
    /// to the remaining callbacks and never propagates out of `emit`.
    /// Returns the number of callbacks that completed normally.
    pub fn emit(&self, event: &Event) -> usize {
        let name = event.name();
        if self.inner.debug.load(Ordering::Relaxed) {
            tracing::debug!(event = name, payload = ?event, "emit");
        }

        let snapshot: Vec<Arc<Listener>> = match self.inner.table().get(name) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut spent = Vec::new();
        let mut delivered = 0;

        for listener in &snapshot {
            if listener.removed.load(Ordering::Acquire) {
                continue;
            }
            if listener.once {
                if listener.fired.swap(true, Ordering::AcqRel) {
                    continue;
                }
                spent.push(listener.id);
            }

            match catch_unwind(AssertUnwindSafe(|| (listener.callback)(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::error!(
                        event = name,
                        error = %panic_payload_to_string(&*payload),
                        "Event listener panicked"
                    );
                }
            }
        }

        if !spent.is_empty() {
            self.inner.remove_where(name, |l| spent.contains(&l.id), false);
        }

        delivered
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.table().get(event).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.inner.table().contains_key(event)
    }

    /// Drop every listener for every event.
    pub fn clear(&self) {
        let mut table = self.inner.table();
        for listener in table.values().flatten() {
            listener.removed.store(true, Ordering::Release);
        }
        table.clear();
    }
}

/// Message carried by a panic payload, if it is a string.
#[must_use]
pub fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
