//! Per-node worker: waits for its dependencies, runs its task, records the
//! result and signals its dependents.

use super::input::merge_inputs;
use crate::cancellation::CancellationToken;
use crate::core::{ExecutionStatus, FlowNode, HubEvent, NodeResult, TestRun, ValueMap};
use crate::errors::TaskError;
use crate::events::ProgressSink;
use crate::tasks::{Task, TaskContext, TaskRegistry};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Terminal status of a node, `None` until it completes.
pub(super) type Signal = Option<ExecutionStatus>;

/// The run record plus the flag that closes it to late writers.
#[derive(Debug)]
pub(super) struct RunState {
    pub(super) run: TestRun,
    pub(super) finalized: bool,
}

impl RunState {
    pub(super) fn new(run: TestRun) -> Self {
        Self {
            run,
            finalized: false,
        }
    }
}

pub(super) struct NodeWorker {
    pub(super) run_id: Uuid,
    pub(super) node: FlowNode,
    /// Completion signal of each distinct dependency, ascending by id.
    pub(super) dependencies: Vec<(String, watch::Receiver<Signal>)>,
    pub(super) done: watch::Sender<Signal>,
    pub(super) state: Arc<Mutex<RunState>>,
    pub(super) registry: Arc<TaskRegistry>,
    pub(super) sink: Arc<dyn ProgressSink>,
    pub(super) cancel: Arc<CancellationToken>,
}

impl NodeWorker {
    pub(super) async fn run(mut self) {
        let dependencies = std::mem::take(&mut self.dependencies);
        let statuses = tokio::select! {
            () = self.cancel.cancelled() => return,
            statuses = wait_for_all(dependencies) => statuses,
        };

        if let Some((dep, status)) = statuses
            .iter()
            .find(|(_, status)| *status != ExecutionStatus::Success)
        {
            let reason = match status {
                ExecutionStatus::Skipped => format!("dependency '{dep}' was skipped"),
                _ => format!("dependency '{dep}' failed"),
            };
            debug!(run_id = %self.run_id, node_id = %self.node.id, %reason, "Node skipped");
            self.complete(NodeResult::skipped(reason));
            return;
        }

        let input = {
            let state = self.state.lock();
            merge_inputs(statuses.iter().filter_map(|(dep, _)| {
                state
                    .run
                    .node_results
                    .get(dep)
                    .and_then(|r| r.output.as_ref())
                    .map(|output| (dep.as_str(), output))
            }))
        };

        let task = match self.resolve() {
            Ok(task) => task,
            Err(e) => {
                warn!(
                    run_id = %self.run_id,
                    node_id = %self.node.id,
                    node_type = %self.node.node_type,
                    error = %e,
                    "Node configuration rejected"
                );
                self.complete(NodeResult::failed(e.to_string(), Duration::ZERO));
                return;
            }
        };

        {
            let state = self.state.lock();
            if state.finalized {
                return;
            }
            self.sink.publish(HubEvent::running(self.run_id, &self.node.id));
        }
        debug!(run_id = %self.run_id, node_id = %self.node.id, node_type = %self.node.node_type, "Node started");

        let ctx = TaskContext {
            run_id: self.run_id,
            node_id: self.node.id.clone(),
            node_type: self.node.node_type.clone(),
            label: self.node.label.clone(),
            config: self.node.config.clone(),
            cancel: Arc::clone(&self.cancel),
        };
        let start = Instant::now();
        let outcome = tokio::select! {
            () = self.cancel.cancelled() => return,
            outcome = AssertUnwindSafe(task.execute(&ctx, input)).catch_unwind() => outcome,
        };
        let elapsed = start.elapsed();

        let result = match outcome {
            Ok(Ok(output)) => NodeResult::success(output, elapsed),
            Ok(Err(TaskError::Cancelled)) if self.cancel.is_cancelled() => return,
            Ok(Err(e)) => NodeResult::failed(e.to_string(), elapsed),
            Err(_) => NodeResult::failed("task panicked", elapsed),
        };
        self.complete(result);
    }

    fn resolve(&self) -> Result<Arc<dyn Task>, TaskError> {
        let task = self.registry.resolve(&self.node.node_type)?;
        task.validate(&self.node.config)?;
        Ok(task)
    }

    /// Records the result, publishes it, then releases dependents.
    ///
    /// Results arriving after the run was finalized are dropped unseen.
    fn complete(&self, result: NodeResult) {
        let status = result.status;
        let duration_ms = result.duration_ms;
        {
            let mut state = self.state.lock();
            if state.finalized {
                debug!(run_id = %self.run_id, node_id = %self.node.id, "Late result discarded");
                return;
            }
            let event = HubEvent::node_result(self.run_id, &self.node.id, &result);
            state.run.node_results.insert(self.node.id.clone(), result);
            self.sink.publish(event);
        }

        debug!(run_id = %self.run_id, node_id = %self.node.id, %status, duration_ms, "Node finished");
        self.done.send_replace(Some(status));
    }
}

/// Waits until every dependency has signalled a terminal status.
///
/// A dependency whose worker vanished without signalling counts as failed.
async fn wait_for_all(
    dependencies: Vec<(String, watch::Receiver<Signal>)>,
) -> Vec<(String, ExecutionStatus)> {
    join_all(dependencies.into_iter().map(|(id, mut rx)| async move {
        let status = match rx.wait_for(Option::is_some).await {
            Ok(signal) => (*signal).unwrap_or(ExecutionStatus::Failed),
            Err(_) => ExecutionStatus::Failed,
        };
        (id, status)
    }))
    .await
}
