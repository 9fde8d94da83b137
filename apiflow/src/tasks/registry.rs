//! Registry mapping node type tags to tasks.

use super::Task;
use crate::errors::TaskError;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of tasks keyed by node type tag.
///
/// Shared across concurrent runs; registration and lookup only need `&self`.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: DashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in node types.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::nodes::register_builtins(&registry);
        registry
    }

    /// Registers a task for a type tag, replacing any previous one.
    pub fn register(&self, node_type: impl Into<String>, task: Arc<dyn Task>) {
        self.tasks.insert(node_type.into(), task);
    }

    /// Resolves the task for a type tag.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownType`] if nothing is registered for the tag.
    pub fn resolve(&self, node_type: &str) -> Result<Arc<dyn Task>, TaskError> {
        self.tasks
            .get(node_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TaskError::UnknownType(node_type.to_string()))
    }

    /// Returns true if a task is registered for the tag.
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.tasks.contains_key(node_type)
    }

    /// Registered type tags in ascending order.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("types", &self.types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Value, ValueMap};
    use crate::tasks::{FnTask, TaskContext};

    fn constant(value: i64) -> Arc<dyn Task> {
        Arc::new(FnTask::new("constant", move |_: &TaskContext, _: ValueMap| {
            Ok(Value::from(value))
        }))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());

        registry.register("one", constant(1));
        assert!(registry.contains("one"));
        assert!(registry.resolve("one").is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = TaskRegistry::new();
        let err = registry.resolve("ftp").err().unwrap();
        assert_eq!(err, TaskError::UnknownType("ftp".into()));
        assert_eq!(err.to_string(), "unknown node type: ftp");
    }

    #[test]
    fn test_register_replaces() {
        let registry = TaskRegistry::new();
        registry.register("n", constant(1));
        registry.register("n", constant(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtins() {
        let registry = TaskRegistry::with_builtins();
        for tag in ["mock", "verification", "report", "event_trigger"] {
            assert!(registry.contains(tag), "missing built-in {tag}");
        }
        #[cfg(feature = "http")]
        assert!(registry.contains("api"));

        let types = registry.types();
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }
}
