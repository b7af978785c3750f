//! Command definitions organized by domain.
//!
//! Commands follow the `Domain.methodName` format and serialize as
//! `{"method": ..., "params": {...}}`. The [`Request`](super::Request)
//! wrapper adds the `id`.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Runtime` | Expression evaluation |
//! | `Network` | Event feed toggling, response bodies |
//! | raw | Any method with arbitrary params |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::NetworkRequestId;

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Network domain commands.
    Network(NetworkCommand),
    /// Untyped command.
    Raw(RawCommand),
}

impl Command {
    /// Creates an untyped command.
    #[inline]
    #[must_use]
    pub fn raw(method: impl Into<String>, params: Value) -> Self {
        Self::Raw(RawCommand {
            method: method.into(),
            params,
        })
    }

    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Runtime(command) => command.method(),
            Self::Network(command) => command.method(),
            Self::Raw(command) => &command.method,
        }
    }
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands for script evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Evaluate an expression in the target's global scope.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// Expression text.
        expression: String,
        /// Return the result serialized by value rather than as a handle.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
        /// Await promise-like results before replying.
        #[serde(rename = "awaitPromise")]
        await_promise: bool,
    },
}

impl RuntimeCommand {
    /// Evaluates `expression` by value, awaiting promises.
    #[inline]
    #[must_use]
    pub fn evaluate(expression: impl Into<String>) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            return_by_value: true,
            await_promise: true,
        }
    }

    /// Returns the wire method name.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Evaluate { .. } => "Runtime.evaluate",
        }
    }
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network domain commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkCommand {
    /// Start the network event feed.
    #[serde(rename = "Network.enable")]
    Enable {
        /// Longest request body, in bytes, included in events.
        #[serde(rename = "maxPostDataSize", skip_serializing_if = "Option::is_none")]
        max_post_data_size: Option<u64>,
    },

    /// Stop the network event feed.
    #[serde(rename = "Network.disable")]
    Disable {},

    /// Fetch the body of a finished response.
    #[serde(rename = "Network.getResponseBody")]
    GetResponseBody {
        /// Target request identifier.
        #[serde(rename = "requestId")]
        request_id: NetworkRequestId,
    },
}

impl NetworkCommand {
    /// Returns the wire method name.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Enable { .. } => "Network.enable",
            Self::Disable {} => "Network.disable",
            Self::GetResponseBody { .. } => "Network.getResponseBody",
        }
    }
}

// ============================================================================
// Raw Command
// ============================================================================

/// A command not modelled by the typed domains.
#[derive(Debug, Clone, Serialize)]
pub struct RawCommand {
    /// Method in `Domain.methodName` format.
    pub method: String,
    /// Parameters object.
    pub params: Value,
}

// ============================================================================
// Command Results
// ============================================================================

/// Result of `Runtime.evaluate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    /// Evaluation result.
    pub result: RemoteObject,
    /// Present when the expression threw.
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

/// Mirror of a target-side value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// Object type (`object`, `number`, `undefined`, ...).
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    /// Value when returned by value.
    #[serde(default)]
    pub value: Option<Value>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Details of an exception thrown during evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Short exception text.
    #[serde(default)]
    pub text: String,
    /// Thrown value.
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    /// Returns the most descriptive message available.
    #[must_use]
    pub fn message(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| self.text.clone())
    }
}

/// Result of `Network.getResponseBody`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    /// Body text, base64 when `base64_encoded` is set.
    pub body: String,
    /// Whether `body` is base64.
    #[serde(default)]
    pub base64_encoded: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_evaluate_serialization() {
        let command = Command::Runtime(RuntimeCommand::evaluate("1+1"));
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(
            value,
            json!({
                "method": "Runtime.evaluate",
                "params": {"expression": "1+1", "returnByValue": true, "awaitPromise": true}
            })
        );
        assert_eq!(command.method(), "Runtime.evaluate");
    }

    #[test]
    fn test_network_enable_has_empty_params() {
        let command = Command::Network(NetworkCommand::Enable {
            max_post_data_size: None,
        });
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(value, json!({"method": "Network.enable", "params": {}}));
    }

    #[test]
    fn test_get_response_body_serialization() {
        let command = Command::Network(NetworkCommand::GetResponseBody {
            request_id: NetworkRequestId::new("7"),
        });
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(
            value,
            json!({"method": "Network.getResponseBody", "params": {"requestId": "7"}})
        );
    }

    #[test]
    fn test_raw_command() {
        let command = Command::raw("Page.reload", json!({"ignoreCache": true}));
        assert_eq!(command.method(), "Page.reload");
        let value = serde_json::to_value(&command).expect("serialize");
        assert_eq!(value["params"]["ignoreCache"], json!(true));
    }

    #[test]
    fn test_exception_message_prefers_description() {
        let details: ExceptionDetails = serde_json::from_value(json!({
            "text": "Uncaught",
            "exception": {"type": "object", "description": "ReferenceError: x is not defined"}
        }))
        .expect("parse");
        assert_eq!(details.message(), "ReferenceError: x is not defined");
    }
}
