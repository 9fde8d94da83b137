//! Flow and executor fixtures.

use std::sync::Arc;

use crate::config::ExecutorConfig;
use crate::core::{Flow, FlowNode, Value};
use crate::events::CollectingProgressSink;
use crate::executor::FlowExecutor;
use crate::tasks::TaskRegistry;

/// Builder for test flows.
#[derive(Debug, Clone)]
pub struct FlowFixture {
    flow: Flow,
}

impl FlowFixture {
    /// Starts an empty flow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            flow: Flow::new(name),
        }
    }

    /// Adds a node with an empty configuration.
    #[must_use]
    pub fn node(mut self, id: &str, node_type: &str) -> Self {
        self.flow.nodes.push(FlowNode::new(id, node_type));
        self
    }

    /// Adds a node with a JSON configuration.
    #[must_use]
    pub fn node_with(mut self, id: &str, node_type: &str, config: serde_json::Value) -> Self {
        self.flow
            .nodes
            .push(FlowNode::new(id, node_type).with_config(Value::from(config)));
        self
    }

    /// Adds an edge: `target` depends on `source`.
    #[must_use]
    pub fn edge(mut self, source: &str, target: &str) -> Self {
        self.flow = self.flow.with_edge(source, target);
        self
    }

    /// Links each id to the next: `a -> b -> c`.
    #[must_use]
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for pair in ids.windows(2) {
            self = self.edge(pair[0], pair[1]);
        }
        self
    }

    /// Returns the flow.
    #[must_use]
    pub fn build(self) -> Flow {
        self.flow
    }
}

/// An executor wired to a collecting sink.
#[derive(Debug)]
pub struct ExecutorHarness {
    /// The executor under test.
    pub executor: FlowExecutor,
    /// Every event the executor published.
    pub sink: Arc<CollectingProgressSink>,
}

impl ExecutorHarness {
    /// Creates a harness with the default configuration.
    #[must_use]
    pub fn new(registry: TaskRegistry) -> Self {
        Self::with_config(registry, ExecutorConfig::default())
    }

    /// Creates a harness with an explicit configuration.
    #[must_use]
    pub fn with_config(registry: TaskRegistry, config: ExecutorConfig) -> Self {
        let sink = Arc::new(CollectingProgressSink::new());
        let executor = FlowExecutor::with_config(Arc::new(registry), sink.clone(), config);
        Self { executor, sink }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_chain() {
        let flow = FlowFixture::new("fixture")
            .node("a", "mock")
            .node("b", "mock")
            .node_with("c", "mock", serde_json::json!({"mockDelay": 1}))
            .chain(&["a", "b", "c"])
            .build();

        assert_eq!(flow.nodes.len(), 3);
        assert_eq!(flow.edges.len(), 2);
        assert_eq!(flow.edges[1].source, "b");
        assert!(flow.validate().is_ok());
    }
}
