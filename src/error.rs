//! Error types for the debugging protocol client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cdp_tap::{Page, Result, SessionOptions};
//!
//! async fn example() -> Result<()> {
//!     let page = Page::connect(SessionOptions::new()).await?;
//!     let value = page.evaluate("1 + 1").await?;
//!     page.close().await
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Startup | [`Error::Config`], [`Error::Discovery`], [`Error::Http`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::MalformedFrame`], [`Error::WebSocket`] |
//! | Protocol | [`Error::Protocol`], [`Error::ScriptError`] |
//! | Hardening | [`Error::RequestTimeout`] |
//! | Decode | [`Error::Decode`], [`Error::Handler`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CommandId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Startup Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint discovery failed.
    ///
    /// Returned when the metadata lookup yields no usable target.
    #[error("Discovery failed: {message}")]
    Discovery {
        /// Description of the discovery failure.
        message: String,
    },

    /// HTTP error during endpoint discovery.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the connection cannot be established or a frame
    /// cannot be written.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// WebSocket connection closed.
    ///
    /// Every command still pending when the connection ends fails with this.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Inbound frame was not valid JSON.
    ///
    /// Fatal to the session.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Parser error description.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The target replied with an error payload.
    ///
    /// Local to the one command that received it.
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Error code reported by the target.
        code: i64,
        /// Error message reported by the target.
        message: String,
    },

    /// Expression evaluation threw inside the target.
    #[error("Script error: {message}")]
    ScriptError {
        /// Exception description from the target.
        message: String,
    },

    // ========================================================================
    // Hardening Errors
    // ========================================================================
    /// No reply arrived for a command within its timeout.
    #[error("Command {command_id} ({method}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Identity of the command that timed out.
        command_id: CommandId,
        /// Method of the command that timed out.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// Captured payload could not be decoded.
    ///
    /// Degrades to "data unavailable" for one exchange.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// Event handler reported a failure.
    #[error("Handler error: {message}")]
    Handler {
        /// Description of the handler failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Creates a script error.
    #[inline]
    pub fn script_error(message: impl Into<String>) -> Self {
        Self::ScriptError {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(command_id: CommandId, method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            command_id,
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a handler error.
    #[inline]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a transport-level error.
    ///
    /// Transport errors are fatal to the session.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::MalformedFrame { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the target rejected the command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::ScriptError { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors leave the session usable.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. }
                | Self::Protocol { .. }
                | Self::ScriptError { .. }
                | Self::Decode { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
