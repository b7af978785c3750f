//! Prompt capture from outgoing completion requests.
//!
//! A narrow specialization of network tracking: only request
//! notifications are consumed, filtered by URL path suffix and HTTP
//! method, and a single field of the decoded JSON body is surfaced.
//! Nothing else about the exchange is retained.

// ============================================================================
// Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{NetworkRequestId, SubscriptionId};
use crate::options::PromptOptions;
use crate::protocol::{Event, RequestData, RequestWillBeSent, methods};
use crate::transport::EventDispatcher;

// ============================================================================
// PromptCapture
// ============================================================================

/// A captured prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptCapture {
    /// Target request identifier.
    pub request_id: NetworkRequestId,

    /// Request URL.
    pub url: String,

    /// Value of the configured body field.
    pub value: Value,
}

impl PromptCapture {
    /// Returns the value as text; strings are unquoted, other values are
    /// rendered as JSON.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Body Decoding
// ============================================================================

/// Decodes a request body as JSON.
///
/// Prefers `postDataEntries` (base64 chunks, concatenated in order) and
/// falls back to inline `postData`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if there is no body or it is not valid
/// base64, UTF-8 or JSON.
pub fn decode_request_body(request: &RequestData) -> Result<Value> {
    let chunks: Vec<&str> = request
        .post_data_entries
        .iter()
        .flatten()
        .filter_map(|entry| entry.bytes.as_deref())
        .collect();

    let text = if !chunks.is_empty() {
        let mut bytes = Vec::new();
        for chunk in chunks {
            let decoded = Base64Standard
                .decode(chunk)
                .map_err(|e| Error::decode(format!("request body base64: {e}")))?;
            bytes.extend_from_slice(&decoded);
        }
        String::from_utf8(bytes).map_err(|e| Error::decode(format!("request body UTF-8: {e}")))?
    } else if let Some(post_data) = &request.post_data {
        post_data.clone()
    } else {
        return Err(Error::decode("request has no body"));
    };

    serde_json::from_str(&text).map_err(|e| Error::decode(format!("request body JSON: {e}")))
}

/// Returns `true` if the URL path ends with `suffix`.
fn path_ends_with(raw: &str, suffix: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => url.path().ends_with(suffix),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .is_some_and(|path| path.ends_with(suffix)),
    }
}

// ============================================================================
// PromptFilter
// ============================================================================

/// Synchronous filter deciding which request notifications yield a capture.
pub struct PromptFilter {
    options: PromptOptions,
    seen: LruCache<NetworkRequestId, (), FxBuildHasher>,
}

impl PromptFilter {
    /// Creates a filter.
    #[must_use]
    pub fn new(options: PromptOptions) -> Self {
        let capacity = NonZeroUsize::new(options.seen_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            options,
            seen: LruCache::with_hasher(capacity, FxBuildHasher),
        }
    }

    /// Returns `true` if the request matches the URL and method filter.
    #[must_use]
    pub fn matches(&self, request: &RequestData) -> bool {
        request.method.eq_ignore_ascii_case(&self.options.method)
            && path_ends_with(&request.url, &self.options.url_suffix)
    }

    /// Processes a request notification.
    ///
    /// A request identifier is reported at most once; it is remembered even
    /// when its body cannot be decoded.
    pub fn on_request_sent(&mut self, params: &RequestWillBeSent) -> Option<PromptCapture> {
        if !self.matches(&params.request) {
            return None;
        }

        if self.seen.put(params.request_id.clone(), ()).is_some() {
            debug!(request_id = %params.request_id, "Prompt request already reported");
            return None;
        }

        let body = match decode_request_body(&params.request) {
            Ok(body) => body,
            Err(e) => {
                warn!(request_id = %params.request_id, error = %e, "Prompt body not decodable");
                return None;
            }
        };

        let value = match body.get(&self.options.field) {
            None | Some(Value::Null) => {
                trace!(request_id = %params.request_id, field = %self.options.field, "Field absent");
                return None;
            }
            Some(Value::String(text)) if text.is_empty() => return None,
            Some(value) => value.clone(),
        };

        Some(PromptCapture {
            request_id: params.request_id.clone(),
            url: params.request.url.clone(),
            value,
        })
    }
}

// ============================================================================
// PromptExtractor
// ============================================================================

/// Live prompt capture on one connection.
///
/// Dropping the extractor removes its event handler.
pub struct PromptExtractor {
    dispatcher: Arc<EventDispatcher>,
    subscription: Option<SubscriptionId>,
    captures: mpsc::UnboundedReceiver<PromptCapture>,
}

impl PromptExtractor {
    /// Registers the extractor's handler on `dispatcher`.
    pub fn attach(dispatcher: &Arc<EventDispatcher>, options: PromptOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter = Mutex::new(PromptFilter::new(options));

        let subscription = dispatcher.on(methods::REQUEST_WILL_BE_SENT, move |event: &Event| {
            let params: RequestWillBeSent = event.params_as()?;
            let capture = filter.lock().on_request_sent(&params);

            if let Some(capture) = capture
                && tx.send(capture).is_err()
            {
                trace!("Prompt receiver dropped");
            }
            Ok(())
        });

        debug!("Prompt extractor attached");

        Self {
            dispatcher: Arc::clone(dispatcher),
            subscription: Some(subscription),
            captures: rx,
        }
    }

    /// Receives the next capture.
    ///
    /// Returns `None` once the connection has closed.
    pub async fn recv(&mut self) -> Option<PromptCapture> {
        self.captures.recv().await
    }

    /// Receives a capture if one is ready.
    pub fn try_recv(&mut self) -> Option<PromptCapture> {
        self.captures.try_recv().ok()
    }
}

impl Drop for PromptExtractor {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.dispatcher.off(id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn encode(text: &str) -> String {
        Base64Standard.encode(text)
    }

    fn completion_event(id: &str, body: &str) -> Event {
        Event::new(
            methods::REQUEST_WILL_BE_SENT,
            json!({
                "requestId": id,
                "request": {
                    "method": "POST",
                    "url": "https://api.example.com/v1/completion",
                    "headers": {},
                    "hasPostData": true,
                    "postDataEntries": [{"bytes": encode(body)}]
                }
            }),
        )
    }

    fn params(event: &Event) -> RequestWillBeSent {
        event.params_as().expect("params")
    }

    #[test]
    fn test_prompt_reported_once() {
        let mut filter = PromptFilter::new(PromptOptions::new());
        let event = completion_event("42", r#"{"prompt":"hi"}"#);

        let capture = filter.on_request_sent(&params(&event)).expect("capture");
        assert_eq!(capture.value, json!("hi"));
        assert_eq!(capture.text(), "hi");
        assert_eq!(capture.request_id.as_str(), "42");

        assert!(filter.on_request_sent(&params(&event)).is_none());
    }

    #[test]
    fn test_filter_by_method_and_suffix() {
        let filter = PromptFilter::new(PromptOptions::new());
        let request = |method: &str, url: &str| RequestData {
            method: method.to_string(),
            url: url.to_string(),
            headers: Default::default(),
            post_data: None,
            has_post_data: None,
            post_data_entries: None,
        };

        assert!(filter.matches(&request("POST", "https://a.com/completion")));
        assert!(filter.matches(&request("POST", "https://a.com/completion?stream=1")));
        assert!(!filter.matches(&request("GET", "https://a.com/completion")));
        assert!(!filter.matches(&request("POST", "https://a.com/completion/x")));
        assert!(!filter.matches(&request("POST", "https://a.com/chat")));
    }

    #[test]
    fn test_inline_post_data_fallback() {
        let mut filter = PromptFilter::new(PromptOptions::new());
        let event = Event::new(
            methods::REQUEST_WILL_BE_SENT,
            json!({
                "requestId": "1",
                "request": {
                    "method": "POST",
                    "url": "https://a.com/completion",
                    "postData": "{\"prompt\":\"inline\"}"
                }
            }),
        );
        let capture = filter.on_request_sent(&params(&event)).expect("capture");
        assert_eq!(capture.text(), "inline");
    }

    #[test]
    fn test_chunked_entries_concatenated() {
        let request: RequestData = serde_json::from_value(json!({
            "method": "POST",
            "url": "https://a.com/completion",
            "postDataEntries": [{"bytes": encode("{\"prompt\":")}, {"bytes": encode("\"split\"}")}]
        }))
        .expect("request");
        assert_eq!(
            decode_request_body(&request).expect("decode"),
            json!({"prompt": "split"})
        );
    }

    #[test]
    fn test_decode_failure_yields_nothing_and_is_remembered() {
        let mut filter = PromptFilter::new(PromptOptions::new());
        let bad = Event::new(
            methods::REQUEST_WILL_BE_SENT,
            json!({
                "requestId": "9",
                "request": {
                    "method": "POST",
                    "url": "https://a.com/completion",
                    "postDataEntries": [{"bytes": "!!not base64!!"}]
                }
            }),
        );
        assert!(filter.on_request_sent(&params(&bad)).is_none());

        let good = completion_event("9", r#"{"prompt":"late"}"#);
        assert!(filter.on_request_sent(&params(&good)).is_none());
    }

    #[test]
    fn test_missing_field_yields_nothing() {
        let mut filter = PromptFilter::new(PromptOptions::new());
        let event = completion_event("1", r#"{"model":"x"}"#);
        assert!(filter.on_request_sent(&params(&event)).is_none());
    }

    #[test]
    fn test_custom_field() {
        let mut filter = PromptFilter::new(PromptOptions::new().with_field("messages"));
        let event = completion_event("1", r#"{"messages":[{"role":"user"}]}"#);
        let capture = filter.on_request_sent(&params(&event)).expect("capture");
        assert_eq!(capture.text(), r#"[{"role":"user"}]"#);
    }

    #[tokio::test]
    async fn test_extractor_publishes_captures() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let mut extractor = PromptExtractor::attach(&dispatcher, PromptOptions::new());

        let event = completion_event("42", r#"{"prompt":"hi"}"#);
        dispatcher.dispatch(&event);
        dispatcher.dispatch(&event);

        let capture = extractor.recv().await.expect("capture");
        assert_eq!(capture.text(), "hi");
        assert!(extractor.try_recv().is_none());

        drop(extractor);
        assert_eq!(dispatcher.handler_count(methods::REQUEST_WILL_BE_SENT), 0);
    }
}
