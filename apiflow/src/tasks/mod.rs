//! Task trait and implementations.
//!
//! A task is the executable behavior behind a node type tag. The executor
//! resolves each node's task through a [`TaskRegistry`], validates the node
//! configuration, then invokes it with the merged dependency outputs.

mod registry;

pub use registry::TaskRegistry;

use crate::cancellation::CancellationToken;
use crate::core::{Value, ValueMap};
use crate::errors::TaskError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a task may know about the node it runs for.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The run being executed.
    pub run_id: Uuid,
    /// The node id.
    pub node_id: String,
    /// The node's type tag.
    pub node_type: String,
    /// The node's display label.
    pub label: String,
    /// The node's opaque configuration.
    pub config: Value,
    /// Fires when the run is cancelled or times out.
    pub cancel: Arc<CancellationToken>,
}

impl TaskContext {
    /// Creates a context with a fresh cancellation token.
    #[must_use]
    pub fn new(run_id: Uuid, node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            run_id,
            node_id: node_id.into(),
            node_type: node_type.into(),
            label: String::new(),
            config: Value::Null,
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the node configuration.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Looks up a key in the node configuration.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Returns true if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The executable behavior behind a node type.
///
/// Implementations must be safe to invoke concurrently for different nodes.
#[async_trait]
pub trait Task: Send + Sync {
    /// Checks the node configuration before the task is invoked.
    ///
    /// An error here fails the node without calling [`Task::execute`].
    fn validate(&self, _config: &Value) -> Result<(), TaskError> {
        Ok(())
    }

    /// Runs the task against the merged outputs of its dependencies.
    async fn execute(&self, ctx: &TaskContext, input: ValueMap) -> Result<Value, TaskError>;
}

/// A simple function-based task.
pub struct FnTask<F>
where
    F: Fn(&TaskContext, ValueMap) -> Result<Value, TaskError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(&TaskContext, ValueMap) -> Result<Value, TaskError> + Send + Sync,
{
    /// Creates a new function-based task.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnTask<F>
where
    F: Fn(&TaskContext, ValueMap) -> Result<Value, TaskError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Task for FnTask<F>
where
    F: Fn(&TaskContext, ValueMap) -> Result<Value, TaskError> + Send + Sync,
{
    async fn execute(&self, ctx: &TaskContext, input: ValueMap) -> Result<Value, TaskError> {
        (self.func)(ctx, input)
    }
}
