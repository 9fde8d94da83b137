//! Dependency graph derived from a flow's edges.
//!
//! An edge `source -> target` means `target` depends on `source`. The graph
//! is built once per run, before any node is invoked, and rejects flows
//! where some node could never become ready.

use crate::core::Flow;
use crate::errors::{CycleDetectedError, FlowError};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Validated, acyclic dependency structure of a flow.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Node ids in flow order.
    nodes: Vec<String>,
    /// Distinct dependencies per node, in ascending id order.
    dependencies: HashMap<String, Vec<String>>,
    /// Distinct dependents per node, in ascending id order.
    dependents: HashMap<String, Vec<String>>,
    /// A topological order; ties keep flow order.
    execution_order: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph for `flow`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Validation`] for a malformed flow and
    /// [`FlowError::CycleDetected`] if any node can never become ready.
    pub fn build(flow: &Flow) -> Result<Self, FlowError> {
        flow.validate()?;

        let nodes: Vec<String> = flow.nodes.iter().map(|n| n.id.clone()).collect();
        let mut incoming: HashMap<&str, BTreeSet<&str>> =
            nodes.iter().map(|id| (id.as_str(), BTreeSet::new())).collect();
        let mut outgoing: HashMap<&str, BTreeSet<&str>> =
            nodes.iter().map(|id| (id.as_str(), BTreeSet::new())).collect();

        for edge in &flow.edges {
            if let Some(deps) = incoming.get_mut(edge.target.as_str()) {
                deps.insert(edge.source.as_str());
            }
            if let Some(deps) = outgoing.get_mut(edge.source.as_str()) {
                deps.insert(edge.target.as_str());
            }
        }

        let execution_order = topological_order(&nodes, &incoming, &outgoing);
        if execution_order.len() < nodes.len() {
            let placed: HashSet<&str> = execution_order.iter().map(String::as_str).collect();
            let stuck: BTreeSet<&str> = nodes
                .iter()
                .map(String::as_str)
                .filter(|id| !placed.contains(id))
                .collect();
            let cycle = find_cycle(&stuck, &incoming);
            return Err(CycleDetectedError::new(
                cycle,
                stuck.iter().map(|s| (*s).to_string()).collect(),
            )
            .into());
        }

        let dependencies = into_owned(incoming);
        let dependents = into_owned(outgoing);

        Ok(Self {
            nodes,
            dependencies,
            dependents,
            execution_order,
        })
    }

    /// Node ids in flow order.
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true for a flow with no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distinct dependencies of a node, in ascending id order.
    #[must_use]
    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.dependencies.get(id).map_or(&[], Vec::as_slice)
    }

    /// Distinct dependents of a node, in ascending id order.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents.get(id).map_or(&[], Vec::as_slice)
    }

    /// Nodes with no dependencies, in flow order.
    #[must_use]
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|id| self.dependencies_of(id).is_empty())
            .map(String::as_str)
            .collect()
    }

    /// One valid topological order.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }
}

fn into_owned(map: HashMap<&str, BTreeSet<&str>>) -> HashMap<String, Vec<String>> {
    map.into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(str::to_string).collect()))
        .collect()
}

/// Kahn's algorithm seeded in flow order. Nodes on or behind a cycle are
/// never emitted.
fn topological_order(
    nodes: &[String],
    incoming: &HashMap<&str, BTreeSet<&str>>,
    outgoing: &HashMap<&str, BTreeSet<&str>>,
) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> = incoming.iter().map(|(k, v)| (*k, v.len())).collect();
    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(String::as_str)
        .filter(|id| in_degree.get(id).copied() == Some(0))
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for dependent in outgoing.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    order
}

/// Extracts one concrete cycle among the stuck nodes.
///
/// Every stuck node has at least one stuck dependency, so walking backwards
/// along dependencies must revisit a node. The path is returned in edge
/// direction with the first node repeated at the end.
fn find_cycle(stuck: &BTreeSet<&str>, incoming: &HashMap<&str, BTreeSet<&str>>) -> Vec<String> {
    let Some(&start) = stuck.iter().next() else {
        return Vec::new();
    };

    let mut walk: Vec<&str> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(&pos) = seen.get(current) {
            let mut cycle: Vec<String> = walk[pos..].iter().rev().map(|s| (*s).to_string()).collect();
            if let Some(first) = cycle.first().cloned() {
                cycle.push(first);
            }
            return cycle;
        }
        seen.insert(current, walk.len());
        walk.push(current);

        let next = incoming
            .get(current)
            .and_then(|deps| deps.iter().find(|d| stuck.contains(*d)));
        match next {
            Some(dep) => current = *dep,
            None => return walk.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FlowNode;
    use pretty_assertions::assert_eq;

    fn flow(nodes: &[&str], edges: &[(&str, &str)]) -> Flow {
        let mut flow = Flow::new("graph");
        for id in nodes {
            flow = flow.with_node(FlowNode::new(*id, "mock"));
        }
        for (s, t) in edges {
            flow = flow.with_edge(*s, *t);
        }
        flow
    }

    #[test]
    fn test_linear_order() {
        let graph = DependencyGraph::build(&flow(&["c", "b", "a"], &[("a", "b"), ("b", "c")])).unwrap();
        assert_eq!(graph.execution_order(), ["a", "b", "c"]);
        assert_eq!(graph.roots(), vec!["a"]);
        assert_eq!(graph.dependencies_of("c"), ["b"]);
        assert_eq!(graph.dependents_of("a"), ["b"]);
    }

    #[test]
    fn test_diamond() {
        let graph = DependencyGraph::build(&flow(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        ))
        .unwrap();

        let order = graph.execution_order();
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
        assert_eq!(graph.dependencies_of("d"), ["b", "c"]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let graph = DependencyGraph::build(&flow(&["a", "b"], &[("a", "b"), ("a", "b")])).unwrap();
        assert_eq!(graph.dependencies_of("b"), ["a"]);
        assert_eq!(graph.execution_order(), ["a", "b"]);
    }

    #[test]
    fn test_empty_flow() {
        let graph = DependencyGraph::build(&Flow::new("empty")).unwrap();
        assert!(graph.is_empty());
        assert!(graph.execution_order().is_empty());
    }

    #[test]
    fn test_isolated_nodes_keep_flow_order() {
        let graph = DependencyGraph::build(&flow(&["z", "y", "x"], &[])).unwrap();
        assert_eq!(graph.execution_order(), ["z", "y", "x"]);
        assert_eq!(graph.roots(), vec!["z", "y", "x"]);
    }

    #[test]
    fn test_cycle_detected() {
        let err = DependencyGraph::build(&flow(&["a", "b"], &[("a", "b"), ("b", "a")])).unwrap_err();
        match err {
            FlowError::CycleDetected(cycle) => {
                assert_eq!(cycle.blocked, vec!["a", "b"]);
                assert_eq!(cycle.cycle_path.len(), 3);
                assert_eq!(cycle.cycle_path.first(), cycle.cycle_path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_blocks_downstream() {
        // d hangs off the b <-> c cycle and can never run either.
        let err = DependencyGraph::build(&flow(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "b"), ("c", "d")],
        ))
        .unwrap_err();
        match err {
            FlowError::CycleDetected(cycle) => {
                assert_eq!(cycle.blocked, vec!["b", "c", "d"]);
                let path: BTreeSet<&str> = cycle.cycle_path.iter().map(String::as_str).collect();
                assert_eq!(path, BTreeSet::from(["b", "c"]));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_path_follows_edges() {
        let err = DependencyGraph::build(&flow(
            &["a", "b", "c"],
            &[("a", "b"), ("b", "c"), ("c", "a")],
        ))
        .unwrap_err();
        let FlowError::CycleDetected(cycle) = err else {
            panic!("expected cycle");
        };
        let path = &cycle.cycle_path;
        for pair in path.windows(2) {
            let expected = match pair[0].as_str() {
                "a" => "b",
                "b" => "c",
                _ => "a",
            };
            assert_eq!(pair[1], expected);
        }
    }

    #[test]
    fn test_self_loop() {
        let err = DependencyGraph::build(&flow(&["a"], &[("a", "a")])).unwrap_err();
        let FlowError::CycleDetected(cycle) = err else {
            panic!("expected cycle");
        };
        assert_eq!(cycle.cycle_path, vec!["a", "a"]);
    }

    #[test]
    fn test_unknown_edge_endpoint() {
        let err = DependencyGraph::build(&flow(&["a"], &[("a", "ghost")])).unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }
}
