//! Per-request state machine for network exchanges.
//!
//! The tracker is synchronous; it decides what should happen and the
//! [`NetworkMonitor`](super::NetworkMonitor) carries it out. Every
//! check-then-act on a request identifier happens under one `&mut self`
//! borrow, so duplicate notifications cannot race into two exchanges.
//!
//! | Input | Tracked? | Outcome |
//! |-------|----------|---------|
//! | request sent | no | new exchange in `Seen` |
//! | request sent | yes | ignored (duplicate) |
//! | response received | no | ignored (orphan) |
//! | response received | `Seen`, textual | `ResponseKnown`, fetch body |
//! | response received | `Seen`, other | `Complete`, evicted |
//! | response received | later state | ignored (duplicate) |
//! | body result | `ResponseKnown` | `Complete`, evicted |
//! | loading failed | any | evicted |

// ============================================================================
// Imports
// ============================================================================

use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::identifiers::NetworkRequestId;
use crate::protocol::ResponseBody;

use super::exchange::{BodyState, ExchangeState, NetworkExchange, RequestInfo, ResponseInfo};

// ============================================================================
// ResponseAction
// ============================================================================

/// What to do after a response notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseAction {
    /// Orphan or duplicate; nothing to do.
    Ignored,

    /// Issue a body fetch for the exchange.
    FetchBody,

    /// Body skipped by content policy; the exchange is finished.
    Completed(NetworkExchange),
}

// ============================================================================
// NetworkTracker
// ============================================================================

/// Bounded map of in-progress exchanges.
///
/// When full, tracking a new request evicts the least recently touched
/// exchange.
pub struct NetworkTracker {
    exchanges: LruCache<NetworkRequestId, NetworkExchange, FxBuildHasher>,
}

impl NetworkTracker {
    /// Creates a tracker holding at most `capacity` exchanges.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            exchanges: LruCache::with_hasher(capacity, FxBuildHasher),
        }
    }

    /// Records a request notification.
    ///
    /// Returns `false` if the request is already tracked.
    pub fn on_request_sent(&mut self, request_id: NetworkRequestId, request: RequestInfo) -> bool {
        if self.exchanges.contains(&request_id) {
            debug!(%request_id, "Duplicate request notification ignored");
            return false;
        }

        let exchange = NetworkExchange::new(request_id.clone(), request);
        if let Some((evicted, _)) = self.exchanges.push(request_id, exchange) {
            warn!(request_id = %evicted, "Tracking capacity reached; oldest exchange evicted");
        }
        true
    }

    /// Records a response notification and decides the follow-up.
    pub fn on_response_received(
        &mut self,
        request_id: &NetworkRequestId,
        response: ResponseInfo,
    ) -> ResponseAction {
        let Some(exchange) = self.exchanges.get_mut(request_id) else {
            debug!(%request_id, "Orphan response ignored");
            return ResponseAction::Ignored;
        };

        if exchange.state != ExchangeState::Seen {
            debug!(%request_id, state = %exchange.state, "Duplicate response ignored");
            return ResponseAction::Ignored;
        }

        let textual = response.is_textual();
        exchange.response = Some(response);
        exchange.state = ExchangeState::ResponseKnown;

        if textual {
            trace!(%request_id, "Response known; body fetch needed");
            return ResponseAction::FetchBody;
        }

        trace!(%request_id, "Non-textual response; body skipped");
        match self.exchanges.pop(request_id) {
            Some(mut exchange) => {
                exchange.body = BodyState::Skipped;
                exchange.state = ExchangeState::Complete;
                ResponseAction::Completed(exchange)
            }
            None => ResponseAction::Ignored,
        }
    }

    /// Records the outcome of a body fetch and evicts the exchange.
    ///
    /// Returns `None` if the exchange is no longer tracked or was not
    /// awaiting its body.
    pub fn on_body(
        &mut self,
        request_id: &NetworkRequestId,
        result: Result<ResponseBody>,
    ) -> Option<NetworkExchange> {
        let awaiting = self
            .exchanges
            .peek(request_id)
            .is_some_and(|exchange| exchange.state == ExchangeState::ResponseKnown);
        if !awaiting {
            debug!(%request_id, "Body result for untracked exchange dropped");
            return None;
        }

        let mut exchange = self.exchanges.pop(request_id)?;
        exchange.body = match result {
            Ok(body) => BodyState::from_response_body(body),
            Err(e) => {
                debug!(%request_id, error = %e, "Response body unavailable");
                BodyState::Unavailable(e.to_string())
            }
        };
        exchange.state = ExchangeState::Complete;
        Some(exchange)
    }

    /// Handles a terminal failure notification by evicting the exchange.
    ///
    /// Returns the evicted exchange, if it was tracked.
    pub fn on_loading_failed(&mut self, request_id: &NetworkRequestId) -> Option<NetworkExchange> {
        let exchange = self.exchanges.pop(request_id);
        if exchange.is_some() {
            trace!(%request_id, "Failed exchange evicted");
        }
        exchange
    }

    /// Returns `true` if the request is tracked.
    #[inline]
    #[must_use]
    pub fn contains(&self, request_id: &NetworkRequestId) -> bool {
        self.exchanges.contains(request_id)
    }

    /// Returns the state of a tracked request.
    #[must_use]
    pub fn state_of(&self, request_id: &NetworkRequestId) -> Option<ExchangeState> {
        self.exchanges.peek(request_id).map(|exchange| exchange.state)
    }

    /// Returns the number of tracked exchanges.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Returns `true` if nothing is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::Headers;

    fn request(url: &str) -> RequestInfo {
        RequestInfo {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: Headers::new(),
            post_data: None,
        }
    }

    fn response(mime_type: &str) -> ResponseInfo {
        ResponseInfo {
            status: 200,
            status_text: "OK".to_string(),
            url: "https://example.com/data".to_string(),
            headers: Headers::new(),
            mime_type: mime_type.to_string(),
        }
    }

    fn id(raw: &str) -> NetworkRequestId {
        NetworkRequestId::new(raw)
    }

    #[test]
    fn test_full_lifecycle() {
        let mut tracker = NetworkTracker::new(10);
        assert!(tracker.on_request_sent(id("1"), request("https://example.com/data")));
        assert_eq!(tracker.state_of(&id("1")), Some(ExchangeState::Seen));

        let action = tracker.on_response_received(&id("1"), response("application/json"));
        assert_eq!(action, ResponseAction::FetchBody);
        assert_eq!(tracker.state_of(&id("1")), Some(ExchangeState::ResponseKnown));

        let exchange = tracker
            .on_body(
                &id("1"),
                Ok(ResponseBody {
                    body: "{}".to_string(),
                    base64_encoded: false,
                }),
            )
            .expect("completed");
        assert_eq!(exchange.state, ExchangeState::Complete);
        assert_eq!(exchange.body.text(), Some("{}"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_duplicate_request_is_ignored() {
        let mut tracker = NetworkTracker::new(10);
        assert!(tracker.on_request_sent(id("1"), request("https://a")));
        assert!(!tracker.on_request_sent(id("1"), request("https://a")));
        assert_eq!(tracker.len(), 1);

        assert_eq!(
            tracker.on_response_received(&id("1"), response("text/plain")),
            ResponseAction::FetchBody
        );
        // A repeated request after the response must not reset the state.
        assert!(!tracker.on_request_sent(id("1"), request("https://a")));
        assert_eq!(tracker.state_of(&id("1")), Some(ExchangeState::ResponseKnown));
    }

    #[test]
    fn test_orphan_response_is_ignored() {
        let mut tracker = NetworkTracker::new(10);
        assert_eq!(
            tracker.on_response_received(&id("7"), response("application/json")),
            ResponseAction::Ignored
        );
        assert!(!tracker.contains(&id("7")));
    }

    #[test]
    fn test_duplicate_response_does_not_refetch() {
        let mut tracker = NetworkTracker::new(10);
        tracker.on_request_sent(id("1"), request("https://a"));
        assert_eq!(
            tracker.on_response_received(&id("1"), response("text/html")),
            ResponseAction::FetchBody
        );
        assert_eq!(
            tracker.on_response_received(&id("1"), response("text/html")),
            ResponseAction::Ignored
        );
    }

    #[test]
    fn test_non_textual_response_completes_immediately() {
        let mut tracker = NetworkTracker::new(10);
        tracker.on_request_sent(id("1"), request("https://a/logo.png"));

        match tracker.on_response_received(&id("1"), response("image/png")) {
            ResponseAction::Completed(exchange) => {
                assert_eq!(exchange.body, BodyState::Skipped);
                assert_eq!(exchange.state, ExchangeState::Complete);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_body_failure_still_completes() {
        let mut tracker = NetworkTracker::new(10);
        tracker.on_request_sent(id("1"), request("https://a"));
        tracker.on_response_received(&id("1"), response("application/json"));

        let exchange = tracker
            .on_body(&id("1"), Err(Error::protocol(-32000, "No resource")))
            .expect("completed");
        assert!(matches!(exchange.body, BodyState::Unavailable(_)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_body_for_untracked_exchange_dropped() {
        let mut tracker = NetworkTracker::new(10);
        tracker.on_request_sent(id("1"), request("https://a"));
        let body = ResponseBody {
            body: String::new(),
            base64_encoded: false,
        };
        // Still in Seen: no fetch was ever requested.
        assert!(tracker.on_body(&id("1"), Ok(body.clone())).is_none());
        assert!(tracker.on_body(&id("2"), Ok(body)).is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_loading_failed_evicts() {
        let mut tracker = NetworkTracker::new(10);
        tracker.on_request_sent(id("1"), request("https://a"));
        assert!(tracker.on_loading_failed(&id("1")).is_some());
        assert!(tracker.on_loading_failed(&id("1")).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut tracker = NetworkTracker::new(2);
        tracker.on_request_sent(id("1"), request("https://a"));
        tracker.on_request_sent(id("2"), request("https://b"));
        tracker.on_request_sent(id("3"), request("https://c"));

        assert_eq!(tracker.len(), 2);
        assert!(!tracker.contains(&id("1")));
        assert!(tracker.contains(&id("3")));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut tracker = NetworkTracker::new(0);
        assert!(tracker.on_request_sent(id("1"), request("https://a")));
        assert_eq!(tracker.len(), 1);
    }
}
