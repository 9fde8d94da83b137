//! Test tasks for exercising the executor.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{Value, ValueMap};
use crate::errors::TaskError;
use crate::tasks::{Task, TaskContext};

/// Whether a [`TaskEvent`] marks the start or the end of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `execute` was entered.
    Started,
    /// `execute` returned.
    Finished,
}

/// One entry of a [`RecordingTask`] log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    /// The node invoked.
    pub node_id: String,
    /// Start or end.
    pub phase: Phase,
}

/// A task whose behavior is scripted by the node configuration and which
/// records every invocation.
///
/// Recognised configuration keys:
/// - `output`: returned on success (default `{"node": <node id>}`)
/// - `fail`: fail with this message instead
/// - `delay_ms`: sleep before returning; cancellable
#[derive(Debug, Default)]
pub struct RecordingTask {
    log: Mutex<Vec<TaskEvent>>,
    inputs: Mutex<HashMap<String, ValueMap>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl RecordingTask {
    /// Creates a new recording task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of invocations across all nodes.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Number of invocations for one node.
    #[must_use]
    pub fn calls_for(&self, node_id: &str) -> usize {
        self.calls.lock().get(node_id).copied().unwrap_or_default()
    }

    /// Returns true if the node was invoked at least once.
    #[must_use]
    pub fn was_invoked(&self, node_id: &str) -> bool {
        self.calls_for(node_id) > 0
    }

    /// The input the node was last invoked with.
    #[must_use]
    pub fn input_for(&self, node_id: &str) -> Option<ValueMap> {
        self.inputs.lock().get(node_id).cloned()
    }

    /// Start and finish events in the order they happened.
    #[must_use]
    pub fn log(&self) -> Vec<TaskEvent> {
        self.log.lock().clone()
    }

    /// Position of a node's event in the log.
    #[must_use]
    pub fn position(&self, node_id: &str, phase: Phase) -> Option<usize> {
        self.log
            .lock()
            .iter()
            .position(|e| e.node_id == node_id && e.phase == phase)
    }

    fn record(&self, node_id: &str, phase: Phase) {
        self.log.lock().push(TaskEvent {
            node_id: node_id.to_string(),
            phase,
        });
    }
}

#[async_trait]
impl Task for RecordingTask {
    async fn execute(&self, ctx: &TaskContext, input: ValueMap) -> Result<Value, TaskError> {
        *self.calls.lock().entry(ctx.node_id.clone()).or_default() += 1;
        self.inputs.lock().insert(ctx.node_id.clone(), input);
        self.record(&ctx.node_id, Phase::Started);

        if let Some(ms) = ctx.config_value("delay_ms").and_then(Value::as_u64) {
            tokio::select! {
                () = ctx.cancel.cancelled() => return Err(TaskError::Cancelled),
                () = tokio::time::sleep(Duration::from_millis(ms)) => {}
            }
        }

        self.record(&ctx.node_id, Phase::Finished);

        if let Some(message) = ctx.config_value("fail").and_then(Value::as_str) {
            return Err(TaskError::execution(message));
        }
        Ok(ctx.config_value("output").cloned().unwrap_or_else(|| {
            [("node".to_string(), Value::from(ctx.node_id.as_str()))]
                .into_iter()
                .collect()
        }))
    }
}

/// A task that always returns the same output.
#[derive(Debug, Clone)]
pub struct StaticTask {
    output: Value,
}

impl StaticTask {
    /// Creates a task returning `output`.
    #[must_use]
    pub fn new(output: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

#[async_trait]
impl Task for StaticTask {
    async fn execute(&self, _ctx: &TaskContext, _input: ValueMap) -> Result<Value, TaskError> {
        Ok(self.output.clone())
    }
}

/// A task that always fails.
#[derive(Debug, Clone)]
pub struct FailingTask {
    error: String,
}

impl FailingTask {
    /// Creates a failing task.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl Task for FailingTask {
    async fn execute(&self, _ctx: &TaskContext, _input: ValueMap) -> Result<Value, TaskError> {
        Err(TaskError::execution(self.error.clone()))
    }
}

/// A task that never returns and ignores cancellation.
#[derive(Debug, Default)]
pub struct HangingTask {
    calls: AtomicUsize,
}

impl HangingTask {
    /// Creates a hanging task.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for HangingTask {
    async fn execute(&self, _ctx: &TaskContext, _input: ValueMap) -> Result<Value, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        futures::future::pending().await
    }
}

/// A task that panics when invoked.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingTask;

#[async_trait]
impl Task for PanickingTask {
    async fn execute(&self, ctx: &TaskContext, _input: ValueMap) -> Result<Value, TaskError> {
        panic!("task for node '{}' panicked", ctx.node_id)
    }
}
