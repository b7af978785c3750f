//! Event routing to registered handlers.
//!
//! Every inbound message that is not a reply reaches the dispatcher, which
//! invokes all handlers registered for the event's `method`, in
//! registration order. A failing handler is logged and skipped; it never
//! stops delivery to its siblings or to later events.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{error, trace, warn};

use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::protocol::Event;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called on the connection's event loop for each matching event. Must not
/// block; long work belongs in a spawned task.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// Handlers for one event kind, in registration order.
type HandlerList = Vec<(SubscriptionId, EventHandler)>;

// ============================================================================
// EventDispatcher
// ============================================================================

/// Routes events to handlers by event kind.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<FxHashMap<String, HandlerList>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no handlers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for events whose `method` equals `kind`.
    ///
    /// Multiple handlers for the same kind are all invoked.
    pub fn on<F>(&self, kind: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let kind = kind.into();
        let id = SubscriptionId::next();
        trace!(%id, %kind, "Handler registered");

        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let mut removed = false;

        handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|(sub, _)| *sub != id);
            removed |= list.len() != before;
            !list.is_empty()
        });

        removed
    }

    /// Returns the number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: &str) -> usize {
        self.handlers.read().get(kind).map_or(0, Vec::len)
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    /// Delivers an event to all handlers registered for its kind.
    ///
    /// Returns the number of handlers that completed without error.
    pub fn dispatch(&self, event: &Event) -> usize {
        // Snapshot so handlers may register or remove handlers.
        let handlers: HandlerList = match self.handlers.read().get(&event.method) {
            Some(list) => list.clone(),
            None => {
                trace!(method = %event.method, "No handlers for event");
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(%id, method = %event.method, error = %e, "Event handler failed");
                }
                Err(payload) => {
                    error!(
                        %id,
                        method = %event.method,
                        panic = %panic_message(payload.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        delivered
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde_json::{Value, json};

    fn event(method: &str, n: u64) -> Event {
        Event::new(method, json!({ "n": n }))
    }

    #[test]
    fn test_all_handlers_for_kind_invoked() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            dispatcher.on("Network.loadingFinished", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        dispatcher.on("Page.loadEventFired", |_| panic!("wrong kind"));

        assert_eq!(dispatcher.dispatch(&event("Network.loadingFinished", 1)), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_arrival_order_preserved() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        dispatcher.on("Test.tick", move |event| {
            sink.lock().push(event.params["n"].as_u64().unwrap_or_default());
            Ok(())
        });

        for n in 1..=5 {
            dispatcher.dispatch(&event("Test.tick", n));
        }
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        dispatcher.on("Test.tick", |_| Err(Error::handler("boom")));
        dispatcher.on("Test.tick", |_| panic!("handler panic"));
        let counter = Arc::clone(&hits);
        dispatcher.on("Test.tick", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(dispatcher.dispatch(&event("Test.tick", 1)), 1);
        assert_eq!(dispatcher.dispatch(&event("Test.tick", 2)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_off_removes_only_that_handler() {
        let dispatcher = EventDispatcher::new();
        let first = dispatcher.on("Test.tick", |_| Ok(()));
        let _second = dispatcher.on("Test.tick", |_| Ok(()));

        assert!(dispatcher.off(first));
        assert!(!dispatcher.off(first));
        assert_eq!(dispatcher.handler_count("Test.tick"), 1);
    }

    #[test]
    fn test_clear_stops_delivery() {
        let dispatcher = EventDispatcher::new();
        dispatcher.on("Test.tick", |_| Ok(()));
        dispatcher.clear();
        assert_eq!(dispatcher.dispatch(&Event::new("Test.tick", Value::Null)), 0);
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let inner = Arc::clone(&dispatcher);
        dispatcher.on("Test.tick", move |_| {
            inner.on("Test.tock", |_| Ok(()));
            Ok(())
        });

        assert_eq!(dispatcher.dispatch(&event("Test.tick", 1)), 1);
        assert_eq!(dispatcher.handler_count("Test.tock"), 1);
    }
}
