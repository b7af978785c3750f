//! Event message types.
//!
//! Events are unsolicited notifications pushed by the target. They carry
//! no `id`; the `method` names the event kind.
//!
//! # Network Events
//!
//! | Event | Meaning |
//! |-------|---------|
//! | `Network.requestWillBeSent` | Request observed (may repeat per `requestId`) |
//! | `Network.responseReceived` | Response headers available |
//! | `Network.loadingFinished` | Body fully received |
//! | `Network.loadingFailed` | Exchange terminated with error |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::NetworkRequestId;

// ============================================================================
// Event Names
// ============================================================================

/// Event method names consumed by this crate.
pub mod methods {
    /// Request observed.
    pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
    /// Response headers received.
    pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";
    /// Body fully received.
    pub const LOADING_FINISHED: &str = "Network.loadingFinished";
    /// Exchange failed.
    pub const LOADING_FAILED: &str = "Network.loadingFailed";
}

/// HTTP header map as sent by the target.
pub type Headers = Map<String, Value>;

// ============================================================================
// Event
// ============================================================================

/// An event notification from target to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Returns the domain name from the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Deserializes the params into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the params do not match `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.params)
            .map_err(|e| Error::decode(format!("{} params: {e}", self.method)))
    }

    /// Parses the event into a typed variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a known event has malformed params.
    pub fn parse(&self) -> Result<ParsedEvent> {
        let parsed = match self.method.as_str() {
            methods::REQUEST_WILL_BE_SENT => {
                ParsedEvent::NetworkRequestWillBeSent(self.params_as()?)
            }
            methods::RESPONSE_RECEIVED => ParsedEvent::NetworkResponseReceived(self.params_as()?),
            methods::LOADING_FINISHED => ParsedEvent::NetworkLoadingFinished(self.params_as()?),
            methods::LOADING_FAILED => ParsedEvent::NetworkLoadingFailed(self.params_as()?),
            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        };
        Ok(parsed)
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Request observed.
    NetworkRequestWillBeSent(RequestWillBeSent),
    /// Response headers received.
    NetworkResponseReceived(ResponseReceived),
    /// Body fully received.
    NetworkLoadingFinished(LoadingFinished),
    /// Exchange failed.
    NetworkLoadingFailed(LoadingFailed),
    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Network Event Params
// ============================================================================

/// Params of `Network.requestWillBeSent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
    /// Request identifier.
    pub request_id: NetworkRequestId,
    /// Request data.
    pub request: RequestData,
    /// Resource type (`XHR`, `Fetch`, `Document`, ...).
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
}

/// HTTP request data.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Headers,
    /// Request body when small enough to inline.
    #[serde(default)]
    pub post_data: Option<String>,
    /// Whether the request has a body.
    #[serde(default)]
    pub has_post_data: Option<bool>,
    /// Request body chunks, base64 encoded.
    #[serde(default)]
    pub post_data_entries: Option<Vec<PostDataEntry>>,
}

/// One chunk of a request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PostDataEntry {
    /// Base64-encoded bytes.
    #[serde(default)]
    pub bytes: Option<String>,
}

/// Params of `Network.responseReceived`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    /// Request identifier.
    pub request_id: NetworkRequestId,
    /// Response data.
    pub response: ResponseData,
    /// Resource type.
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
}

/// HTTP response metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    /// Response URL.
    #[serde(default)]
    pub url: String,
    /// HTTP status code.
    #[serde(default)]
    pub status: u16,
    /// HTTP status text.
    #[serde(default)]
    pub status_text: String,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Resource MIME type.
    #[serde(default)]
    pub mime_type: String,
}

/// Params of `Network.loadingFinished`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
    /// Request identifier.
    pub request_id: NetworkRequestId,
    /// Bytes received over the wire.
    #[serde(default)]
    pub encoded_data_length: f64,
}

/// Params of `Network.loadingFailed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
    /// Request identifier.
    pub request_id: NetworkRequestId,
    /// Failure description.
    #[serde(default)]
    pub error_text: String,
    /// Whether the request was canceled.
    #[serde(default)]
    pub canceled: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_event_names() {
        let event = Event::new(methods::RESPONSE_RECEIVED, Value::Null);
        assert_eq!(event.domain(), "Network");
        assert_eq!(event.event_name(), "responseReceived");
    }

    #[test]
    fn test_request_will_be_sent_parsing() {
        let event = Event::new(
            methods::REQUEST_WILL_BE_SENT,
            json!({
                "requestId": "42",
                "request": {
                    "method": "POST",
                    "url": "https://api.example.com/completion",
                    "headers": {"Content-Type": "application/json"},
                    "hasPostData": true,
                    "postDataEntries": [{"bytes": "eyJwcm9tcHQiOiJoaSJ9"}]
                },
                "type": "Fetch"
            }),
        );

        match event.parse().expect("parse") {
            ParsedEvent::NetworkRequestWillBeSent(params) => {
                assert_eq!(params.request_id.as_str(), "42");
                assert_eq!(params.request.method, "POST");
                assert_eq!(params.request.has_post_data, Some(true));
                assert_eq!(params.resource_type.as_deref(), Some("Fetch"));
                let entries = params.request.post_data_entries.expect("entries");
                assert_eq!(entries[0].bytes.as_deref(), Some("eyJwcm9tcHQiOiJoaSJ9"));
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_response_received_parsing() {
        let event = Event::new(
            methods::RESPONSE_RECEIVED,
            json!({
                "requestId": "7",
                "response": {
                    "url": "https://example.com/data.json",
                    "status": 200,
                    "headers": {},
                    "mimeType": "application/json"
                }
            }),
        );

        match event.parse().expect("parse") {
            ParsedEvent::NetworkResponseReceived(params) => {
                assert_eq!(params.response.status, 200);
                assert_eq!(params.response.mime_type, "application/json");
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_known_event_is_decode_error() {
        let event = Event::new(methods::RESPONSE_RECEIVED, json!({"response": 3}));
        assert!(matches!(event.parse(), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_unknown_event() {
        let event = Event::new("Page.loadEventFired", json!({"timestamp": 1.0}));
        match event.parse().expect("parse") {
            ParsedEvent::Unknown { method, .. } => assert_eq!(method, "Page.loadEventFired"),
            other => panic!("expected Unknown variant, got {other:?}"),
        }
    }
}
