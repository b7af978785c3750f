//! Expression evaluation methods.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Command, EvaluateResult, RuntimeCommand};

use super::Page;

// ============================================================================
// Page - Evaluation
// ============================================================================

impl Page {
    /// Evaluates an expression in the target's global scope.
    ///
    /// The result is returned by value; promises are awaited.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let title = page.evaluate("document.title").await?;
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::ScriptError`] if the expression throws
    /// - [`Error::Decode`] if the reply has no evaluation result
    /// - Any transport or protocol error from [`send_command`](Self::send_command)
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        debug!(expression_len = expression.len(), "Evaluating expression");

        let command = Command::Runtime(RuntimeCommand::evaluate(expression));
        let reply = self.send_command(command).await?;

        let result: EvaluateResult = serde_json::from_value(reply)
            .map_err(|e| Error::decode(format!("Runtime.evaluate result: {e}")))?;

        if let Some(details) = result.exception_details {
            return Err(Error::script_error(details.message()));
        }

        Ok(result.result.value.unwrap_or(Value::Null))
    }

    /// Evaluates an expression and deserializes its value.
    ///
    /// # Errors
    ///
    /// As [`evaluate`](Self::evaluate), plus [`Error::Decode`] if the value
    /// does not match `T`.
    pub async fn evaluate_as<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let value = self.evaluate(expression).await?;
        serde_json::from_value(value).map_err(|e| Error::decode(format!("evaluation value: {e}")))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encodes a string as a JavaScript string literal.
pub(crate) fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.escape_default()))
}

// ============================================================================
// Tests
// ============================================================================
