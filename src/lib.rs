//! cdp-tap - Remote debugging protocol client.
//!
//! This library attaches to an application exposing a remote debugging
//! endpoint (Chromium, Electron, Node) and multiplexes commands and events
//! over its single WebSocket connection.
//!
//! # Architecture
//!
//! One connection carries two interleaved streams:
//!
//! - **Replies**: matched to the in-flight command by `id`, never by
//!   arrival order
//! - **Events**: routed by `method` to registered handlers, in arrival order
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns: WebSocket + event loop task + correlation
//!   table + event dispatcher
//! - Command identities are per connection, start at 1 and are never reused
//! - Closing the connection fails every pending command; nothing waits forever
//! - Network exchanges are joined by request identifier in a bounded tracker
//!
//! # Quick Start
//!
//! ```no_run
//! use cdp_tap::{Page, PromptOptions, Result, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Discover the first target on 127.0.0.1:9222 and connect
//!     let page = Page::connect(SessionOptions::new()).await?;
//!
//!     // Evaluate in the page
//!     let sum = page.evaluate("1 + 1").await?;
//!     println!("1 + 1 = {sum}");
//!
//!     // Watch completion requests
//!     let mut prompts = page.capture_prompts(PromptOptions::new()).await?;
//!     if let Some(capture) = prompts.recv().await {
//!         println!("Prompt: {:?}", capture.text());
//!     }
//!
//!     page.close().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`network`] | Network exchange tracking and prompt capture |
//! | [`options`] | Session, network and prompt options |
//! | [`page`] | Target handle: [`Page`] |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | Connection, correlation, dispatch, discovery |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing command and request identifiers.
pub mod identifiers;

/// Network exchange tracking and prompt capture.
pub mod network;

/// Session, network and prompt options.
pub mod options;

/// Target page handle and tasks.
pub mod page;

/// Wire message types.
///
/// Commands, replies, events and inbound frame classification.
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection event loop, command correlation, event dispatch and
/// endpoint discovery.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, NetworkRequestId, SubscriptionId};

// Network types
pub use network::{
    BodyState, ExchangeState, NetworkExchange, NetworkMonitor, NetworkUpdate, PromptCapture,
    PromptExtractor, RequestInfo, ResponseInfo,
};

// Option types
pub use options::{NetworkOptions, PromptOptions, SessionOptions};

// Page types
pub use page::{BatteryInfo, ConnectionInfo, MediaDevice, Page, StorageSnapshot, SystemInfo};

// Protocol types
pub use protocol::{Command, Event};

// Transport types
pub use transport::{CommandSink, Connection, ConnectionState, TargetInfo};
