//! Session, network capture and prompt capture options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cdp_tap::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .with_port(9229)
//!     .with_command_timeout(Duration::from_secs(5));
//!
//! assert_eq!(options.discovery_url(), "http://127.0.0.1:9229/json");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default debugging host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default debugging port.
pub const DEFAULT_PORT: u16 = 9222;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect and discovery timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on tracked network exchanges.
pub const DEFAULT_EXCHANGE_CAPACITY: usize = 1000;

/// Default bound on remembered prompt request IDs.
pub const DEFAULT_SEEN_CAPACITY: usize = 1024;

// ============================================================================
// SessionOptions
// ============================================================================

/// Connection settings for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Host serving the metadata endpoint.
    pub host: String,

    /// Port serving the metadata endpoint.
    pub port: u16,

    /// Time to wait for each command's reply.
    pub command_timeout: Duration,

    /// Time to wait for discovery and the WebSocket handshake.
    pub connect_timeout: Duration,

    /// `Sec-WebSocket-Protocol` value to offer, if any.
    pub subprotocol: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            subprotocol: None,
        }
    }

    /// Sets the metadata host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the metadata port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the per-command timeout.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Offers a WebSocket subprotocol during the handshake.
    #[inline]
    #[must_use]
    pub fn with_subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocol = Some(protocol.into());
        self
    }

    /// Returns the target list URL.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!("http://{}:{}/json", self.host, self.port)
    }

    /// Checks the options for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("port must be non-zero"));
        }
        if self.command_timeout.is_zero() {
            return Err(Error::config("command timeout must be non-zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// NetworkOptions
// ============================================================================

/// Network capture settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOptions {
    /// Maximum exchanges tracked at once; the oldest is evicted beyond it.
    pub capacity: usize,

    /// Longest request body, in bytes, the target inlines in events.
    pub max_post_data_size: Option<u64>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capacity: DEFAULT_EXCHANGE_CAPACITY,
            max_post_data_size: None,
        }
    }

    /// Sets the tracking capacity.
    #[inline]
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the inline request body limit.
    #[inline]
    #[must_use]
    pub const fn with_max_post_data_size(mut self, bytes: u64) -> Self {
        self.max_post_data_size = Some(bytes);
        self
    }
}

// ============================================================================
// PromptOptions
// ============================================================================

/// Prompt capture filter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    /// URL path suffix of interesting requests.
    pub url_suffix: String,

    /// HTTP method of interesting requests.
    pub method: String,

    /// Top-level body field to surface.
    pub field: String,

    /// Maximum request IDs remembered for duplicate suppression.
    pub seen_capacity: usize,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            url_suffix: "/completion".to_string(),
            method: "POST".to_string(),
            field: "prompt".to_string(),
            seen_capacity: DEFAULT_SEEN_CAPACITY,
        }
    }
}

impl PromptOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL suffix filter.
    #[inline]
    #[must_use]
    pub fn with_url_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.url_suffix = suffix.into();
        self
    }

    /// Sets the HTTP method filter.
    #[inline]
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets the body field to surface.
    #[inline]
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SessionOptions::new();
        assert_eq!(options.host, "127.0.0.1");
        assert_eq!(options.port, 9222);
        assert_eq!(options.command_timeout.as_secs(), 30);
        assert!(options.subprotocol.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_discovery_url() {
        let options = SessionOptions::new().with_host("localhost").with_port(9333);
        assert_eq!(options.discovery_url(), "http://localhost:9333/json");
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(SessionOptions::new().with_port(0).validate().is_err());
        assert!(
            SessionOptions::new()
                .with_command_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(SessionOptions::new().with_host(" ").validate().is_err());
    }

    #[test]
    fn test_prompt_defaults() {
        let options = PromptOptions::new();
        assert_eq!(options.url_suffix, "/completion");
        assert_eq!(options.method, "POST");
        assert_eq!(options.field, "prompt");
    }

    #[test]
    fn test_network_builder() {
        let options = NetworkOptions::new()
            .with_capacity(10)
            .with_max_post_data_size(65536);
        assert_eq!(options.capacity, 10);
        assert_eq!(options.max_post_data_size, Some(65536));
    }
}
