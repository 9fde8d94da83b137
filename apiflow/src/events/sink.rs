//! Progress sink trait and implementations.

use crate::core::HubEvent;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Receives progress events from the executor.
///
/// `publish` is called from node workers while they complete, so it must
/// hand the event off without blocking and must never panic.
pub trait ProgressSink: Send + Sync {
    /// Hands an event off without blocking.
    fn publish(&self, event: HubEvent);
}

/// A no-op sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn publish(&self, _event: HubEvent) {}
}

/// A sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingProgressSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingProgressSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgressSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl ProgressSink for LoggingProgressSink {
    fn publish(&self, event: HubEvent) {
        let run_id = event.run_id();
        let status = event.status();
        let node_id = event.node_id().unwrap_or("-");

        if self.level == Level::DEBUG {
            debug!(%run_id, node_id, %status, "Progress event");
        } else {
            info!(%run_id, node_id, %status, "Progress event");
        }
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    events: RwLock<Vec<HubEvent>>,
}

impl CollectingProgressSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in publish order.
    #[must_use]
    pub fn events(&self) -> Vec<HubEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns the updates published for one node, in order.
    #[must_use]
    pub fn events_for_node(&self, node_id: &str) -> Vec<HubEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.node_id() == Some(node_id))
            .cloned()
            .collect()
    }

    /// Returns the position of the first event matching `predicate`.
    #[must_use]
    pub fn position(&self, predicate: impl Fn(&HubEvent) -> bool) -> Option<usize> {
        self.events.read().iter().position(predicate)
    }
}

impl ProgressSink for CollectingProgressSink {
    fn publish(&self, event: HubEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionStatus;
    use uuid::Uuid;

    #[test]
    fn test_noop_sink() {
        NoOpProgressSink.publish(HubEvent::running(Uuid::nil(), "A"));
    }

    #[test]
    fn test_logging_sink() {
        LoggingProgressSink::default().publish(HubEvent::running(Uuid::nil(), "A"));
        LoggingProgressSink::debug().publish(HubEvent::RunComplete {
            run_id: Uuid::nil(),
            status: ExecutionStatus::Success,
            duration_ms: 1,
        });
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingProgressSink::new();
        assert!(sink.is_empty());

        sink.publish(HubEvent::running(Uuid::nil(), "A"));
        sink.publish(HubEvent::running(Uuid::nil(), "B"));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events_for_node("B").len(), 1);
        assert_eq!(sink.position(|e| e.node_id() == Some("B")), Some(1));
    }
}
