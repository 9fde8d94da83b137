//! Flow executor.
//!
//! Runs every node of a flow concurrently, one worker per node. A worker
//! starts its task only after each dependency has signalled a terminal
//! status through its own completion channel; there is no polling. Results
//! are recorded under one lock, then published, then signalled.
//!
//! The run ends on whichever comes first: every worker finished, the caller
//! cancelled, or the configured ceiling elapsed.

mod input;
mod worker;


pub use input::merge_inputs;

use crate::cancellation::CancellationToken;
use crate::config::ExecutorConfig;
use crate::core::{Flow, HubEvent, TestRun};
use crate::errors::FlowError;
use crate::events::ProgressSink;
use crate::graph::DependencyGraph;
use crate::observability::{node_span, run_span};
use crate::tasks::TaskRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};
use uuid::Uuid;
use worker::{NodeWorker, RunState, Signal};

/// Error recorded on a run that hit the ceiling.
pub const TIMEOUT_ERROR: &str = "Execution timeout";
/// Error recorded on a run the caller cancelled.
pub const CANCELLED_ERROR: &str = "Execution cancelled";

enum Outcome {
    Completed,
    TimedOut,
    Cancelled,
}

/// Executes flows against a task registry, publishing progress to a sink.
///
/// One executor can drive any number of concurrent runs.
pub struct FlowExecutor {
    registry: Arc<TaskRegistry>,
    sink: Arc<dyn ProgressSink>,
    config: ExecutorConfig,
}

impl FlowExecutor {
    /// Creates an executor with the default configuration.
    #[must_use]
    pub fn new(registry: Arc<TaskRegistry>, sink: Arc<dyn ProgressSink>) -> Self {
        Self::with_config(registry, sink, ExecutorConfig::default())
    }

    /// Creates an executor with an explicit configuration.
    #[must_use]
    pub fn with_config(
        registry: Arc<TaskRegistry>,
        sink: Arc<dyn ProgressSink>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            config,
        }
    }

    /// Returns the task registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Returns the executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes `flow` to completion.
    ///
    /// Node failures are recorded in the returned run and never surface as
    /// errors. A `RunComplete` event is published on every path that
    /// produces a run.
    ///
    /// # Errors
    ///
    /// - [`FlowError::Validation`] or [`FlowError::CycleDetected`] before any
    ///   node runs; no run is created.
    /// - [`FlowError::Timeout`] when the ceiling elapses, and
    ///   [`FlowError::Cancelled`] when `cancel` fires. Both carry the
    ///   finalized, failed run. Workers still in flight are told to stop but
    ///   may not have unwound yet.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        flow: &Flow,
    ) -> Result<TestRun, FlowError> {
        self.execute_with_run_id(cancel, flow, Uuid::new_v4()).await
    }

    /// Executes `flow` under a run id chosen by the caller.
    ///
    /// Lets observers subscribe to the hub before the first event is
    /// published. Behaves like [`FlowExecutor::execute`] otherwise.
    ///
    /// # Errors
    ///
    /// See [`FlowExecutor::execute`].
    pub async fn execute_with_run_id(
        &self,
        cancel: &CancellationToken,
        flow: &Flow,
        run_id: Uuid,
    ) -> Result<TestRun, FlowError> {
        let graph = DependencyGraph::build(flow).map_err(|e| {
            warn!(flow_id = %flow.id, error = %e, "Flow rejected");
            e
        })?;

        let run = TestRun::start_with_id(flow, run_id);
        info!(%run_id, flow_id = %flow.id, nodes = graph.len(), "Run started");

        let state = Arc::new(Mutex::new(RunState::new(run)));
        let run_token = Arc::new(CancellationToken::new());

        let mut senders: HashMap<&str, watch::Sender<Signal>> = graph
            .nodes()
            .iter()
            .map(|id| (id.as_str(), watch::channel(None).0))
            .collect();
        let receivers: Vec<Vec<(String, watch::Receiver<Signal>)>> = flow
            .nodes
            .iter()
            .map(|node| {
                graph
                    .dependencies_of(&node.id)
                    .iter()
                    .filter_map(|dep| senders.get(dep.as_str()).map(|tx| (dep.clone(), tx.subscribe())))
                    .collect()
            })
            .collect();

        let mut workers = JoinSet::new();
        for (node, dependencies) in flow.nodes.iter().zip(receivers) {
            let Some(done) = senders.remove(node.id.as_str()) else {
                continue;
            };
            let span = node_span(run_id, &node.id, &node.node_type);
            let worker = NodeWorker {
                run_id,
                node: node.clone(),
                dependencies,
                done,
                state: Arc::clone(&state),
                registry: Arc::clone(&self.registry),
                sink: Arc::clone(&self.sink),
                cancel: Arc::clone(&run_token),
            };
            workers.spawn(worker.run().instrument(span));
        }

        let ceiling = self.config.run_timeout();
        let outcome = async {
            tokio::select! {
                biased;
                () = drain(&mut workers) => Outcome::Completed,
                () = cancel.cancelled() => Outcome::Cancelled,
                () = tokio::time::sleep(ceiling) => Outcome::TimedOut,
            }
        }
        .instrument(run_span(run_id, flow.id))
        .await;

        let error = match outcome {
            Outcome::Completed => None,
            Outcome::TimedOut => Some(TIMEOUT_ERROR),
            Outcome::Cancelled => Some(CANCELLED_ERROR),
        };
        if let Some(reason) = error {
            run_token.cancel(reason);
            workers.detach_all();
        }

        let run = {
            let mut state = state.lock();
            state.finalized = true;
            state.run.finalize(error.map(str::to_string));
            self.sink.publish(HubEvent::run_complete(&state.run));
            state.run.clone()
        };

        match outcome {
            Outcome::Completed => {
                info!(
                    %run_id,
                    status = %run.status,
                    duration_ms = run.duration_ms.unwrap_or_default(),
                    failed = run.failed_nodes().len(),
                    skipped = run.skipped_nodes().len(),
                    "Run finished"
                );
                Ok(run)
            }
            Outcome::TimedOut => {
                warn!(%run_id, timeout_ms = self.config.run_timeout_ms, "Run timed out");
                Err(FlowError::Timeout {
                    run: Box::new(run),
                    timeout_ms: self.config.run_timeout_ms,
                })
            }
            Outcome::Cancelled => {
                let reason = cancel.reason().unwrap_or_else(|| CANCELLED_ERROR.to_string());
                warn!(%run_id, %reason, "Run cancelled");
                Err(FlowError::Cancelled {
                    run: Box::new(run),
                    reason,
                })
            }
        }
    }
}

impl std::fmt::Debug for FlowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExecutor")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn drain(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Node worker aborted");
        }
    }
}
