//! Test run record and per-node results.

use super::{ExecutionStatus, Flow, Value};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// The terminal outcome of one node within one run.
///
/// Written exactly once per node per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    /// Terminal status: success, failed or skipped.
    pub status: ExecutionStatus,

    /// The node's output (present only on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Error message (present only on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Why the node was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Wall time in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

impl NodeResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(output: Value, duration: Duration) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output: Some(output),
            error: None,
            skip_reason: None,
            duration_ms: millis(duration),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output: None,
            error: Some(error.into()),
            skip_reason: None,
            duration_ms: millis(duration),
        }
    }

    /// Creates a skipped result.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Skipped,
            output: None,
            error: None,
            skip_reason: Some(reason.into()),
            duration_ms: 0,
        }
    }

    /// Returns true if the node succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the node failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// One execution record of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    /// Run identity; observers subscribe by this id.
    pub id: Uuid,
    /// The flow this run executes.
    pub flow_id: Uuid,
    /// The flow's name at execution time.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flow_name: String,
    /// Overall status.
    pub status: ExecutionStatus,
    /// When execution began.
    pub started_at: Timestamp,
    /// When the run was finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Total wall time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Per-node results keyed by node id.
    #[serde(default)]
    pub node_results: BTreeMap<String, NodeResult>,
    /// Run-level error (timeout or cancellation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestRun {
    /// Creates a running record for `flow`.
    #[must_use]
    pub fn start(flow: &Flow) -> Self {
        Self::start_with_id(flow, Uuid::new_v4())
    }

    /// Creates a running record for `flow` with a caller-chosen identity.
    #[must_use]
    pub fn start_with_id(flow: &Flow, id: Uuid) -> Self {
        Self {
            id,
            flow_id: flow.id,
            flow_name: flow.name.clone(),
            status: ExecutionStatus::Running,
            started_at: now_utc(),
            completed_at: None,
            duration_ms: None,
            node_results: BTreeMap::new(),
            error: None,
        }
    }

    /// Returns true once [`TestRun::finalize`] has run.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Ids of nodes whose result is failed, in ascending order.
    #[must_use]
    pub fn failed_nodes(&self) -> Vec<&str> {
        self.nodes_with(ExecutionStatus::Failed)
    }

    /// Ids of nodes whose result is skipped, in ascending order.
    #[must_use]
    pub fn skipped_nodes(&self) -> Vec<&str> {
        self.nodes_with(ExecutionStatus::Skipped)
    }

    fn nodes_with(&self, status: ExecutionStatus) -> Vec<&str> {
        self.node_results
            .iter()
            .filter(|(_, r)| r.status == status)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Sets the final status, completion time and duration.
    ///
    /// A run-level `error` forces `Failed`; otherwise the status is derived
    /// from the node results. Only the first call has any effect; returns
    /// whether this call finalized the run.
    pub fn finalize(&mut self, error: Option<String>) -> bool {
        if self.is_finalized() {
            return false;
        }

        let completed_at = now_utc();
        let elapsed = (completed_at - self.started_at).num_milliseconds().max(0);

        self.status = if error.is_some() {
            ExecutionStatus::Failed
        } else {
            derive_status(self.node_results.values())
        };
        self.error = error;
        self.completed_at = Some(completed_at);
        self.duration_ms = Some(u64::try_from(elapsed).unwrap_or_default());
        true
    }
}

/// Derives a run status from node results.
///
/// The run succeeds iff no result failed. Skipped results neither force
/// failure nor count toward success.
pub fn derive_status<'a>(results: impl IntoIterator<Item = &'a NodeResult>) -> ExecutionStatus {
    if results.into_iter().any(NodeResult::is_failure) {
        ExecutionStatus::Failed
    } else {
        ExecutionStatus::Success
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
