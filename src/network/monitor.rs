//! Network monitor: the tracker wired to live events.
//!
//! The monitor registers handlers on a connection's dispatcher, feeds
//! network events to a [`NetworkTracker`], issues body fetches through a
//! [`CommandSink`] and publishes [`NetworkUpdate`]s on a channel.
//!
//! Body fetches run as spawned tasks so the event loop never waits on
//! them; they interleave freely with other in-flight commands.
//!
//! # Example
//!
//! ```ignore
//! let mut monitor = page.monitor_network(NetworkOptions::new()).await?;
//! while let Some(update) = monitor.recv().await {
//!     println!("{update:?}");
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{NetworkRequestId, SubscriptionId};
use crate::options::NetworkOptions;
use crate::protocol::{Command, Event, NetworkCommand, ParsedEvent, ResponseBody, methods};
use crate::transport::{CommandSink, EventDispatcher};

use super::exchange::{NetworkUpdate, RequestInfo, ResponseInfo};
use super::tracker::{NetworkTracker, ResponseAction};

// ============================================================================
// MonitorInner
// ============================================================================

/// State shared by the event handlers and body-fetch tasks.
struct MonitorInner {
    tracker: Arc<Mutex<NetworkTracker>>,
    sink: Arc<dyn CommandSink>,
    updates: mpsc::UnboundedSender<NetworkUpdate>,
}

impl MonitorInner {
    /// Feeds one network event to the tracker.
    fn handle_event(self: &Arc<Self>, event: &Event) -> Result<()> {
        match event.parse()? {
            ParsedEvent::NetworkRequestWillBeSent(params) => {
                let request = RequestInfo::from(&params.request);
                let tracked = self
                    .tracker
                    .lock()
                    .on_request_sent(params.request_id.clone(), request.clone());

                if tracked {
                    self.publish(NetworkUpdate::Request {
                        request_id: params.request_id,
                        request,
                    });
                }
            }

            ParsedEvent::NetworkResponseReceived(params) => {
                let response = ResponseInfo::from(&params.response);
                let action = self
                    .tracker
                    .lock()
                    .on_response_received(&params.request_id, response.clone());

                match action {
                    ResponseAction::Ignored => {}
                    ResponseAction::FetchBody => {
                        self.publish(NetworkUpdate::Response {
                            request_id: params.request_id.clone(),
                            response,
                        });
                        self.fetch_body(params.request_id);
                    }
                    ResponseAction::Completed(exchange) => {
                        self.publish(NetworkUpdate::Response {
                            request_id: params.request_id,
                            response,
                        });
                        self.publish(NetworkUpdate::Completed(exchange));
                    }
                }
            }

            ParsedEvent::NetworkLoadingFailed(params) => {
                if self
                    .tracker
                    .lock()
                    .on_loading_failed(&params.request_id)
                    .is_some()
                {
                    self.publish(NetworkUpdate::Failed {
                        request_id: params.request_id,
                        error_text: params.error_text,
                        canceled: params.canceled,
                    });
                }
            }

            ParsedEvent::NetworkLoadingFinished(_) | ParsedEvent::Unknown { .. } => {}
        }

        Ok(())
    }

    /// Spawns a `Network.getResponseBody` call for a tracked exchange.
    fn fetch_body(self: &Arc<Self>, request_id: NetworkRequestId) {
        let inner = Arc::clone(self);

        tokio::spawn(async move {
            trace!(%request_id, "Fetching response body");

            let command = Command::Network(NetworkCommand::GetResponseBody {
                request_id: request_id.clone(),
            });
            let result = inner
                .sink
                .send_command(command)
                .await
                .and_then(|value| {
                    serde_json::from_value::<ResponseBody>(value)
                        .map_err(|e| Error::decode(format!("response body: {e}")))
                });

            let completed = inner.tracker.lock().on_body(&request_id, result);
            if let Some(exchange) = completed {
                inner.publish(NetworkUpdate::Completed(exchange));
            }
        });
    }

    fn publish(&self, update: NetworkUpdate) {
        if self.updates.send(update).is_err() {
            trace!("Network update receiver dropped");
        }
    }
}

// ============================================================================
// NetworkMonitor
// ============================================================================

/// Live network capture on one connection.
///
/// Dropping the monitor removes its event handlers. The update stream ends
/// once the connection closes and in-flight body fetches finish.
pub struct NetworkMonitor {
    dispatcher: Arc<EventDispatcher>,
    subscriptions: Vec<SubscriptionId>,
    tracker: Arc<Mutex<NetworkTracker>>,
    updates: mpsc::UnboundedReceiver<NetworkUpdate>,
}

impl NetworkMonitor {
    /// Registers the monitor's handlers on `dispatcher`.
    ///
    /// Does not enable the target's network feed; see
    /// [`Page::monitor_network`](crate::Page::monitor_network).
    pub fn attach(
        dispatcher: &Arc<EventDispatcher>,
        sink: Arc<dyn CommandSink>,
        options: &NetworkOptions,
    ) -> Self {
        let tracker = Arc::new(Mutex::new(NetworkTracker::new(options.capacity)));
        let (tx, rx) = mpsc::unbounded_channel();

        let inner = Arc::new(MonitorInner {
            tracker: Arc::clone(&tracker),
            sink,
            updates: tx,
        });

        let subscriptions = [
            methods::REQUEST_WILL_BE_SENT,
            methods::RESPONSE_RECEIVED,
            methods::LOADING_FAILED,
        ]
        .into_iter()
        .map(|method| {
            let inner = Arc::clone(&inner);
            dispatcher.on(method, move |event| inner.handle_event(event))
        })
        .collect();

        debug!(capacity = options.capacity, "Network monitor attached");

        Self {
            dispatcher: Arc::clone(dispatcher),
            subscriptions,
            tracker,
            updates: rx,
        }
    }

    /// Receives the next update.
    ///
    /// Returns `None` once the connection has closed and all pending work
    /// has drained.
    pub async fn recv(&mut self) -> Option<NetworkUpdate> {
        self.updates.recv().await
    }

    /// Receives an update if one is ready.
    pub fn try_recv(&mut self) -> Option<NetworkUpdate> {
        self.updates.try_recv().ok()
    }

    /// Returns the number of exchanges currently tracked.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracker.lock().len()
    }

    /// Removes the monitor's handlers.
    pub fn detach(self) {
        drop(self);
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.dispatcher.off(id);
        }
        trace!("Network monitor detached");
    }
}

// ============================================================================
// Tests
// ============================================================================
