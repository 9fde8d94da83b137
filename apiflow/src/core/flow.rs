//! Flow definition: typed nodes connected by data-dependency edges.

use super::Value;
use crate::errors::FlowValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Position of a node in the visual editor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// A typed, configured vertex of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    /// Node id, unique within its flow.
    pub id: String,
    /// Type tag used to resolve the node's task (e.g. `"api"`, `"mock"`).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Opaque node configuration handed to the task.
    #[serde(default)]
    pub config: Value,
    /// Editor position; irrelevant to execution.
    #[serde(default)]
    pub position: Position,
}

impl FlowNode {
    /// Creates a node with an empty configuration.
    #[must_use]
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            node_type: node_type.into(),
            config: Value::empty_map(),
            position: Position::default(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<Value>) -> Self {
        self.config = config.into();
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the editor position.
    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// A directed dependency edge: `target` consumes the output of `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    /// Edge id.
    #[serde(default)]
    pub id: String,
    /// The upstream node id.
    pub source: String,
    /// The downstream node id.
    pub target: String,
    /// Optional named output handle on the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Optional named input handle on the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl FlowEdge {
    /// Creates an edge from `source` to `target`.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    /// Sets the named handles on both ends.
    #[must_use]
    pub fn with_handles(
        mut self,
        source_handle: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        self.source_handle = Some(source_handle.into());
        self.target_handle = Some(target_handle.into());
        self
    }
}

/// A user-authored graph of nodes and edges describing a test scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Flow identity.
    pub id: Uuid,
    /// Flow name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Tags for grouping.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Nodes in authoring order.
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    /// Dependency edges.
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

impl Flow {
    /// Creates an empty flow with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: FlowNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds an edge from `source` to `target`.
    #[must_use]
    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(FlowEdge::new(source, target));
        self
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Checks the structural invariants: node ids are non-empty and unique,
    /// and every edge references existing nodes.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), FlowValidationError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(FlowValidationError::empty_node_id());
            }
            if !seen.insert(node.id.as_str()) {
                return Err(FlowValidationError::duplicate_node(&node.id));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(FlowValidationError::unknown_node(&edge.id, endpoint));
                }
            }
        }

        Ok(())
    }
}
