//! WebSocket transport layer.
//!
//! This module owns the single duplex connection to the target and the
//! two components that share its inbound stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   send()    ┌────────────────────┐   text frames   ┌──────────┐
//! │    Caller    │────────────►│     Connection     │◄───────────────►│  Target  │
//! │              │◄────────────│  (event loop task) │                 │          │
//! └──────────────┘  reply      │                    │                 └──────────┘
//!                              │  CorrelationTable  │ replies by id
//!                              │  EventDispatcher   │ events by method
//!                              └────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `discover` - Read the debugger URL from the metadata endpoint
//! 2. `Connection::connect` - WebSocket handshake, spawn event loop
//! 3. `Connection::send` / `Connection::on` - Commands and event handlers
//! 4. `Connection::close` - Fail pending commands, close the socket once
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `correlation` | Command identity allocation and reply matching |
//! | `discovery` | HTTP endpoint discovery |
//! | `dispatcher` | Event routing to handlers |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Command identity allocation and reply matching.
pub mod correlation;

/// HTTP endpoint discovery.
pub mod discovery;

/// Event routing to handlers.
pub mod dispatcher;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{CommandSink, Connection, ConnectionState};
pub use correlation::CorrelationTable;
pub use discovery::{TargetInfo, debugger_url, discover, list_targets};
pub use dispatcher::{EventDispatcher, EventHandler};
