//! Error types for the apiflow engine.
//!
//! Only structural, cycle, timeout and cancellation errors are run-level and
//! returned from the executor. Node-level [`TaskError`]s are rendered into the
//! failing node's result, and hub delivery failures are handled internally by
//! evicting the observer.

use crate::core::TestRun;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Run-level errors returned by [`crate::executor::FlowExecutor::execute`].
#[derive(Debug, Error)]
pub enum FlowError {
    /// The flow is structurally malformed; no node was invoked.
    #[error("{0}")]
    Validation(#[from] FlowValidationError),

    /// The dependency graph contains a cycle; no node was invoked.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// The global deadline fired before the graph resolved.
    #[error("Execution timeout: run exceeded {timeout_ms}ms")]
    Timeout {
        /// The finalized (failed) run record.
        run: Box<TestRun>,
        /// The ceiling that fired.
        timeout_ms: u64,
    },

    /// The caller cancelled the run before the graph resolved.
    #[error("Execution cancelled: {reason}")]
    Cancelled {
        /// The finalized (failed) run record.
        run: Box<TestRun>,
        /// The cancellation reason.
        reason: String,
    },
}

impl FlowError {
    /// Returns the finalized run carried by timeout and cancellation errors.
    #[must_use]
    pub fn run(&self) -> Option<&TestRun> {
        match self {
            Self::Timeout { run, .. } | Self::Cancelled { run, .. } => Some(run.as_ref()),
            Self::Validation(_) | Self::CycleDetected(_) => None,
        }
    }

    /// Consumes the error, returning the carried run if any.
    #[must_use]
    pub fn into_run(self) -> Option<TestRun> {
        match self {
            Self::Timeout { run, .. } | Self::Cancelled { run, .. } => Some(*run),
            Self::Validation(_) | Self::CycleDetected(_) => None,
        }
    }

    /// Returns true for errors raised before any node ran.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::CycleDetected(_))
    }
}

/// Metadata about an error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "FLOW-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a flow violates its structural invariants.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FlowValidationError {
    /// The error message.
    pub message: String,
    /// The node ids involved.
    pub nodes: Vec<String>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl FlowValidationError {
    fn new(code: &str, message: String, nodes: Vec<String>) -> Self {
        Self {
            error_info: ErrorInfo::new(code, message.clone()),
            message,
            nodes,
        }
    }

    /// A node id appears more than once.
    #[must_use]
    pub fn duplicate_node(id: &str) -> Self {
        Self::new(
            "FLOW-DUPLICATE-NODE",
            format!("Duplicate node id '{id}'"),
            vec![id.to_string()],
        )
    }

    /// An edge references a node that does not exist.
    #[must_use]
    pub fn unknown_node(edge_id: &str, node_id: &str) -> Self {
        let mut err = Self::new(
            "FLOW-UNKNOWN-NODE",
            format!("Edge '{edge_id}' references unknown node '{node_id}'"),
            vec![node_id.to_string()],
        );
        err.error_info = err
            .error_info
            .with_fix_hint("Remove the edge or add the missing node.")
            .with_context_entry("edge", edge_id);
        err
    }

    /// A node has an empty id.
    #[must_use]
    pub fn empty_node_id() -> Self {
        Self::new("FLOW-EMPTY-ID", "Node id cannot be empty".to_string(), Vec::new())
    }
}

/// Error raised when a cycle is detected in the dependency graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in flow: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// One concrete cycle, first node repeated at the end.
    pub cycle_path: Vec<String>,
    /// Every node that can never become ready, in ascending order.
    pub blocked: Vec<String>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>, blocked: Vec<String>) -> Self {
        let info = ErrorInfo::new(
            "FLOW-CYCLE",
            format!("Flow contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the edges in the cycle to break it.");

        Self {
            cycle_path,
            blocked,
            error_info: info,
        }
    }
}

/// Node-level errors produced while resolving, validating or executing a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// No task is registered for the node's type tag.
    #[error("unknown node type: {0}")]
    UnknownType(String),

    /// The node configuration is invalid; the task was not invoked.
    #[error("{0}")]
    ConfigValidation(String),

    /// The task ran and failed.
    #[error("{0}")]
    Execution(String),

    /// The task observed cancellation.
    #[error("execution cancelled")]
    Cancelled,
}

impl TaskError {
    /// Creates a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation(message.into())
    }

    /// Creates an execution error.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Returns true if the task was never invoked.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::UnknownType(_) | Self::ConfigValidation(_))
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A setting is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned by progress hub queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// The hub actor is no longer running.
    #[error("progress hub is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Flow;

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("node", "A");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("node"), Some(&"A".to_string()));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(
            vec!["a".into(), "b".into(), "a".into()],
            vec!["a".into(), "b".into(), "c".into()],
        );

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.error_info.code, "FLOW-CYCLE");
        assert_eq!(err.blocked.len(), 3);
    }

    #[test]
    fn test_unknown_node_error_context() {
        let err = FlowValidationError::unknown_node("e1", "ghost");
        assert_eq!(err.error_info.context.get("edge"), Some(&"e1".to_string()));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_task_error_messages() {
        assert_eq!(
            TaskError::UnknownType("ftp".into()).to_string(),
            "unknown node type: ftp"
        );
        assert_eq!(TaskError::config("url is required").to_string(), "url is required");
        assert!(TaskError::config("x").is_config_error());
        assert!(!TaskError::execution("x").is_config_error());
    }

    #[test]
    fn test_flow_error_carries_run() {
        let mut run = TestRun::start(&Flow::new("t"));
        run.finalize(Some("Execution timeout".into()));
        let err = FlowError::Timeout {
            run: Box::new(run),
            timeout_ms: 10,
        };

        assert!(!err.is_precondition());
        assert_eq!(err.run().and_then(|r| r.error.as_deref()), Some("Execution timeout"));
        assert!(err.into_run().is_some());

        let cycle: FlowError = CycleDetectedError::new(vec![], vec![]).into();
        let invalid: FlowError = FlowValidationError::empty_node_id().into();
        assert!(invalid.is_precondition());
        assert!(invalid.into_run().is_none());
        assert!(cycle.is_precondition());
        assert!(cycle.run().is_none());
    }
}
