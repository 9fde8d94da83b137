//! Progress events fanned out to live observers of a run.

use super::{ExecutionStatus, NodeResult, TestRun, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An execution event keyed by run identity.
///
/// The serialized form is what a transport sends to a remote observer:
///
/// ```json
/// {"type":"node_update","testRunId":"…","nodeId":"B","status":"running","output":null,"error":null}
/// {"type":"test_run_complete","testRunId":"…","status":"failed","duration":42}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HubEvent {
    /// A node changed state.
    #[serde(rename = "node_update", rename_all = "camelCase")]
    NodeUpdate {
        /// The run the node belongs to.
        #[serde(rename = "testRunId")]
        run_id: Uuid,
        /// The node id.
        node_id: String,
        /// `running`, or the node's terminal status.
        status: ExecutionStatus,
        /// The node output on success.
        #[serde(default)]
        output: Option<Value>,
        /// The error message on failure.
        #[serde(default)]
        error: Option<String>,
    },

    /// The run reached its final status.
    #[serde(rename = "test_run_complete")]
    RunComplete {
        /// The completed run.
        #[serde(rename = "testRunId")]
        run_id: Uuid,
        /// The final run status.
        status: ExecutionStatus,
        /// Total run time in milliseconds.
        #[serde(rename = "duration")]
        duration_ms: u64,
    },
}

impl HubEvent {
    /// Creates a `running` update for a node.
    #[must_use]
    pub fn running(run_id: Uuid, node_id: impl Into<String>) -> Self {
        Self::NodeUpdate {
            run_id,
            node_id: node_id.into(),
            status: ExecutionStatus::Running,
            output: None,
            error: None,
        }
    }

    /// Creates a terminal update from a node result.
    #[must_use]
    pub fn node_result(run_id: Uuid, node_id: impl Into<String>, result: &NodeResult) -> Self {
        Self::NodeUpdate {
            run_id,
            node_id: node_id.into(),
            status: result.status,
            output: result.output.clone(),
            error: result.error.clone().or_else(|| result.skip_reason.clone()),
        }
    }

    /// Creates a completion event from a finalized run.
    #[must_use]
    pub fn run_complete(run: &TestRun) -> Self {
        Self::RunComplete {
            run_id: run.id,
            status: run.status,
            duration_ms: run.duration_ms.unwrap_or_default(),
        }
    }

    /// Returns the run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::NodeUpdate { run_id, .. } | Self::RunComplete { run_id, .. } => *run_id,
        }
    }

    /// Returns the status carried by the event.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::NodeUpdate { status, .. } | Self::RunComplete { status, .. } => *status,
        }
    }

    /// Returns the node id for node updates.
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeUpdate { node_id, .. } => Some(node_id),
            Self::RunComplete { .. } => None,
        }
    }

    /// Returns true for the run completion event.
    #[must_use]
    pub fn is_run_complete(&self) -> bool {
        matches!(self, Self::RunComplete { .. })
    }

    /// Encodes the event as JSON text for a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Flow;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_node_update_wire_format() {
        let run_id = Uuid::nil();
        let event = HubEvent::running(run_id, "B");
        let encoded: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(
            encoded,
            json!({
                "type": "node_update",
                "testRunId": "00000000-0000-0000-0000-000000000000",
                "nodeId": "B",
                "status": "running",
                "output": null,
                "error": null
            })
        );
    }

    #[test]
    fn test_run_complete_wire_format() {
        let mut run = TestRun::start(&Flow::new("wire"));
        run.finalize(None);
        let event = HubEvent::run_complete(&run);

        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["type"], "test_run_complete");
        assert_eq!(encoded["status"], "success");
        assert_eq!(encoded["testRunId"], run.id.to_string());
        assert!(encoded["duration"].is_u64());
    }

    #[test]
    fn test_node_result_event() {
        let result = NodeResult::failed("boom", Duration::from_millis(5));
        let event = HubEvent::node_result(Uuid::nil(), "A", &result);

        assert_eq!(event.status(), ExecutionStatus::Failed);
        assert_eq!(event.node_id(), Some("A"));
        match event {
            HubEvent::NodeUpdate { error, output, .. } => {
                assert_eq!(error.as_deref(), Some("boom"));
                assert!(output.is_none());
            }
            HubEvent::RunComplete { .. } => panic!("expected node update"),
        }
    }

    #[test]
    fn test_event_round_trip() {
        let event = HubEvent::RunComplete {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Failed,
            duration_ms: 17,
        };
        let decoded: HubEvent = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(decoded, event);
    }
}
