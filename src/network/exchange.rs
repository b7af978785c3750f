//! Network exchange types.
//!
//! One [`NetworkExchange`] follows a single HTTP request/response pair,
//! keyed by the target's request identifier.
//!
//! # Lifecycle
//!
//! ```text
//! (absent) ──request──► Seen ──response──► ResponseKnown ──body──► Complete
//!                        │                      │
//!                        └──── loadingFailed ───┴──► (evicted)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;

use crate::identifiers::NetworkRequestId;
use crate::protocol::{Headers, RequestData, ResponseBody, ResponseData};

// ============================================================================
// ExchangeState
// ============================================================================

/// Progress of one exchange. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExchangeState {
    /// Request observed.
    Seen,
    /// Response metadata recorded.
    ResponseKnown,
    /// Body resolved, skipped or unavailable.
    Complete,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seen => "seen",
            Self::ResponseKnown => "response-known",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

// ============================================================================
// RequestInfo
// ============================================================================

/// Request side of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: String,

    /// Request URL.
    pub url: String,

    /// Request headers.
    pub headers: Headers,

    /// Inline request body, if the target sent one.
    pub post_data: Option<String>,
}

impl From<&RequestData> for RequestInfo {
    fn from(request: &RequestData) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            post_data: request.post_data.clone(),
        }
    }
}

// ============================================================================
// ResponseInfo
// ============================================================================

/// Response metadata of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseInfo {
    /// HTTP status code.
    pub status: u16,

    /// HTTP status text.
    pub status_text: String,

    /// Response URL.
    pub url: String,

    /// Response headers.
    pub headers: Headers,

    /// Resource MIME type.
    pub mime_type: String,
}

impl ResponseInfo {
    /// Returns `true` if the body is worth fetching.
    #[inline]
    #[must_use]
    pub fn is_textual(&self) -> bool {
        is_textual(&self.mime_type)
    }
}

impl From<&ResponseData> for ResponseInfo {
    fn from(response: &ResponseData) -> Self {
        Self {
            status: response.status,
            status_text: response.status_text.clone(),
            url: response.url.clone(),
            headers: response.headers.clone(),
            mime_type: response.mime_type.clone(),
        }
    }
}

/// Textual content policy: JSON or any `text` type.
///
/// Bodies of other types are never fetched.
#[inline]
#[must_use]
pub fn is_textual(mime_type: &str) -> bool {
    mime_type.contains("application/json") || mime_type.contains("text")
}

// ============================================================================
// BodyState
// ============================================================================

/// Response body outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyState {
    /// Not resolved yet.
    Pending,

    /// Body text. Base64 bodies are decoded when they are valid UTF-8.
    Available(String),

    /// The fetch failed; the reason is kept for display.
    Unavailable(String),

    /// Not fetched because the content is not textual.
    Skipped,
}

impl BodyState {
    /// Builds the body outcome from a `Network.getResponseBody` result.
    #[must_use]
    pub fn from_response_body(body: ResponseBody) -> Self {
        if !body.base64_encoded {
            return Self::Available(body.body);
        }

        match Base64Standard.decode(body.body.as_bytes()) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Self::Available(text),
                Err(_) => Self::Available(body.body),
            },
            Err(_) => Self::Available(body.body),
        }
    }

    /// Returns the body text if available.
    #[inline]
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Available(text) => Some(text),
            _ => None,
        }
    }
}

// ============================================================================
// NetworkExchange
// ============================================================================

/// One tracked request/response pair.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkExchange {
    /// Target request identifier.
    pub request_id: NetworkRequestId,

    /// Request side.
    pub request: RequestInfo,

    /// Response metadata, once known.
    pub response: Option<ResponseInfo>,

    /// Body outcome.
    pub body: BodyState,

    /// Current state.
    pub state: ExchangeState,
}

impl NetworkExchange {
    /// Creates an exchange in the [`Seen`](ExchangeState::Seen) state.
    #[must_use]
    pub fn new(request_id: NetworkRequestId, request: RequestInfo) -> Self {
        Self {
            request_id,
            request,
            response: None,
            body: BodyState::Pending,
            state: ExchangeState::Seen,
        }
    }
}

// ============================================================================
// NetworkUpdate
// ============================================================================

/// Notification published by the network monitor.
#[derive(Debug, Clone)]
pub enum NetworkUpdate {
    /// A new request was observed.
    Request {
        /// Target request identifier.
        request_id: NetworkRequestId,
        /// Request data.
        request: RequestInfo,
    },

    /// Response metadata arrived for a tracked request.
    Response {
        /// Target request identifier.
        request_id: NetworkRequestId,
        /// Response metadata.
        response: ResponseInfo,
    },

    /// The exchange reached its terminal state.
    Completed(NetworkExchange),

    /// The target reported the exchange as failed.
    Failed {
        /// Target request identifier.
        request_id: NetworkRequestId,
        /// Failure description.
        error_text: String,
        /// Whether the request was canceled.
        canceled: bool,
    },
}

impl NetworkUpdate {
    /// Returns the request identifier the update concerns.
    #[must_use]
    pub fn request_id(&self) -> &NetworkRequestId {
        match self {
            Self::Request { request_id, .. }
            | Self::Response { request_id, .. }
            | Self::Failed { request_id, .. } => request_id,
            Self::Completed(exchange) => &exchange.request_id,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
