//! Remote debugging protocol message types.
//!
//! This module defines the JSON frames exchanged with the target over the
//! single duplex connection.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Discriminant |
//! |--------------|-----------|--------------|
//! | `Request` | Local → Target | `id` + `method` |
//! | `Response` | Target → Local | `id` |
//! | `Event` | Target → Local | `method`, no `id` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions and typed results |
//! | `event` | Event envelope and network event params |
//! | `inbound` | Reply/event classification |
//! | `request` | Request and Response frames |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Inbound frame classification.
pub mod inbound;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, EvaluateResult, ExceptionDetails, NetworkCommand, RawCommand, RemoteObject,
    ResponseBody, RuntimeCommand,
};
pub use event::{
    Event, Headers, LoadingFailed, LoadingFinished, ParsedEvent, PostDataEntry, RequestData,
    RequestWillBeSent, ResponseData, ResponseReceived, methods,
};
pub use inbound::Inbound;
pub use request::{ErrorPayload, Request, Response};
