//! Inbound frame classification.
//!
//! Every text frame from the target is either a reply to a command
//! (carries `id`) or an event (carries `method` and no `id`).

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::{Error, Result};

use super::{Event, Response};

// ============================================================================
// Inbound
// ============================================================================

/// A classified inbound message.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Reply to a command.
    Reply(Response),
    /// Unsolicited event.
    Event(Event),
    /// Valid JSON of no recognised shape.
    Unrecognized(Value),
}

impl Inbound {
    /// Parses and classifies a text frame.
    ///
    /// Presence of `id` is the discriminant. A frame that is JSON but
    /// neither a reply nor an event is returned as
    /// [`Inbound::Unrecognized`] so the caller can log and skip it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the frame is not JSON.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::malformed_frame(e.to_string()))?;

        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some_and(Value::is_string);

        if has_id {
            return Ok(match serde_json::from_value::<Response>(value.clone()) {
                Ok(response) => Self::Reply(response),
                Err(_) => Self::Unrecognized(value),
            });
        }

        if has_method {
            return Ok(match serde_json::from_value::<Event>(value.clone()) {
                Ok(event) => Self::Event(event),
                Err(_) => Self::Unrecognized(value),
            });
        }

        Ok(Self::Unrecognized(value))
    }
}

// ============================================================================
// Tests
// ============================================================================
