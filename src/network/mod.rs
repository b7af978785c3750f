//! Network traffic correlation.
//!
//! Joins `Network.requestWillBeSent` and `Network.responseReceived` by
//! request identifier, fetches textual response bodies, and captures
//! prompts from completion requests.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `exchange` | Exchange, body and update types |
//! | `tracker` | Per-request state machine |
//! | `monitor` | Tracker wired to a live connection |
//! | `prompt` | Prompt capture specialization |

// ============================================================================
// Submodules
// ============================================================================

/// Exchange, body and update types.
pub mod exchange;

/// Network monitor.
pub mod monitor;

/// Prompt capture.
pub mod prompt;

/// Per-request state machine.
pub mod tracker;

// ============================================================================
// Re-exports
// ============================================================================

pub use exchange::{
    BodyState, ExchangeState, NetworkExchange, NetworkUpdate, RequestInfo, ResponseInfo,
    is_textual,
};
pub use monitor::NetworkMonitor;
pub use prompt::{PromptCapture, PromptExtractor, PromptFilter, decode_request_body};
pub use tracker::{NetworkTracker, ResponseAction};
