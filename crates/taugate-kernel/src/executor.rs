//! The tool-executor seam.
//!
//! The kernel never runs tools itself; it interposes on a
//! [`ToolExecutor`] supplied by the embedding application. Executors are
//! untrusted: their failures are recorded in the event log and propagated,
//! never swallowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tool invocation as captured at propose time.
///
/// The `tool` string is what scope gates match against (`read_file`,
/// `payment:transfer`, ...). Arguments are opaque to the kernel and flow
/// through the mirror and the executor untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAction {
    /// The tool/action string, matched against mandate action patterns.
    pub tool: String,

    /// Opaque arguments, forwarded to the executor verbatim.
    pub arguments: serde_json::Value,

    /// The resource the action touches, matched by the resource gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Estimated cost in the smallest currency unit, used by the budget
    /// gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<u64>,
}

impl ToolAction {
    /// Creates an action with no resource or cost annotations.
    #[must_use]
    pub fn new(tool: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            resource: None,
            estimated_cost: None,
        }
    }

    /// Annotates the action with the resource it touches.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Annotates the action with an estimated cost.
    #[must_use]
    pub const fn with_estimated_cost(mut self, cost: u64) -> Self {
        self.estimated_cost = Some(cost);
        self
    }
}

/// Error returned by a tool executor.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ToolExecutorError {
    /// What went wrong, in the executor's words.
    pub message: String,
}

impl ToolExecutorError {
    /// Creates an executor error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The external tool back-end the kernel interposes on.
///
/// Implementations run the actual side effect — the payment, the file
/// write, the model call — and return its output as JSON. The kernel
/// calls `execute` only after every gate has passed, and records a
/// `COMMITTED` event first, so even a crashing executor leaves an
/// auditable attempt.
pub trait ToolExecutor: Send + Sync {
    /// Executes the action and returns its output.
    ///
    /// # Errors
    ///
    /// Returns [`ToolExecutorError`] when the tool fails; the kernel
    /// records an `EXECUTION_FAILED` event and propagates the error.
    fn execute(&self, action: &ToolAction) -> Result<serde_json::Value, ToolExecutorError>;
}

impl<F> ToolExecutor for F
where
    F: Fn(&ToolAction) -> Result<serde_json::Value, ToolExecutorError> + Send + Sync,
{
    fn execute(&self, action: &ToolAction) -> Result<serde_json::Value, ToolExecutorError> {
        self(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_wire_form_omits_absent_annotations() {
        let action = ToolAction::new("read_file", serde_json::json!({"path": "/tmp/x"}));
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["tool"], "read_file");
        assert!(value.get("resource").is_none());
        assert!(value.get("estimated_cost").is_none());
    }

    #[test]
    fn annotations_round_trip() {
        let action = ToolAction::new("payment:transfer", serde_json::json!({"amount": 250}))
            .with_resource("account:checking")
            .with_estimated_cost(250);
        let json = serde_json::to_string(&action).unwrap();
        let back: ToolAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }

    #[test]
    fn plain_functions_are_executors() {
        fn echo(action: &ToolAction) -> Result<serde_json::Value, ToolExecutorError> {
            Ok(serde_json::json!({"echo": action.tool.clone()}))
        }

        let executor: Box<dyn ToolExecutor> = Box::new(echo);
        let output = executor
            .execute(&ToolAction::new("ping", serde_json::json!({})))
            .unwrap();
        assert_eq!(output["echo"], "ping");
    }
}
