//! Progress hub: fans live execution events out to observers of a run.
//!
//! The hub is one explicitly constructed service. A single actor task owns
//! the map from run id to registered observers; registration, removal,
//! publishing and queries are all submitted to it as commands, so callers
//! never touch the map and publish never waits on an observer.
//!
//! ```rust,ignore
//! let hub = ProgressHub::start(HubConfig::default());
//! let mut stream = hub.subscribe(run_id);
//! while let Some(event) = stream.recv().await {
//!     transport.send(event.to_json()?).await?;
//! }
//! ```

mod metrics;
mod subscriber;

pub use metrics::HubMetrics;
pub use subscriber::{EventStream, ObserverId, Subscriber};

use crate::config::HubConfig;
use crate::core::HubEvent;
use crate::errors::HubError;
use crate::events::ProgressSink;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

enum Command {
    Register(Subscriber),
    Unregister(ObserverId),
    Publish(HubEvent),
    ObserverCount {
        run_id: Uuid,
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the running hub actor.
pub struct ProgressHub {
    tx: mpsc::UnboundedSender<Command>,
    config: HubConfig,
    metrics: Arc<HubMetrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressHub {
    /// Spawns the hub actor on the current tokio runtime.
    #[must_use]
    pub fn start(config: HubConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(HubMetrics::default());

        let actor = HubActor {
            runs: HashMap::new(),
            index: HashMap::new(),
            metrics: Arc::clone(&metrics),
        };
        let handle = tokio::spawn(actor.run(rx));
        info!(observer_buffer = config.observer_buffer, "Progress hub started");

        Arc::new(Self {
            tx,
            config,
            metrics,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Returns the hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Returns the delivery metrics.
    #[must_use]
    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    /// Returns true until the actor has stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Creates an observer for `run_id` with the configured buffer and
    /// registers it.
    #[must_use]
    pub fn subscribe(&self, run_id: Uuid) -> EventStream {
        let (subscriber, stream) = Subscriber::channel(run_id, self.config.observer_buffer);
        self.register(subscriber);
        stream
    }

    /// Registers an observer. Registering an id twice is a no-op.
    ///
    /// After shutdown the subscriber is dropped, which ends its stream.
    pub fn register(&self, subscriber: Subscriber) {
        self.submit(Command::Register(subscriber));
    }

    /// Removes an observer from whichever run holds it and closes its stream.
    pub fn unregister(&self, id: ObserverId) {
        self.submit(Command::Unregister(id));
    }

    /// Hands an event to the actor without waiting.
    pub fn publish(&self, event: HubEvent) {
        self.submit(Command::Publish(event));
    }

    /// Returns the number of observers registered for `run_id`.
    ///
    /// Answered by the actor after every previously submitted command.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] after shutdown.
    pub async fn observer_count(&self, run_id: Uuid) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ObserverCount { run_id, reply })
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Closes every observer stream and stops the actor.
    ///
    /// Commands already submitted are processed first. Idempotent.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).is_ok() {
            let _ = rx.await;
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
            info!("Progress hub stopped");
        }
    }

    fn submit(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("Progress hub is closed; command dropped");
        }
    }
}

impl ProgressSink for ProgressHub {
    fn publish(&self, event: HubEvent) {
        ProgressHub::publish(self, event);
    }
}

impl std::fmt::Debug for ProgressHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHub")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

/// State owned exclusively by the actor task.
struct HubActor {
    runs: HashMap<Uuid, HashMap<ObserverId, Subscriber>>,
    index: HashMap<ObserverId, Uuid>,
    metrics: Arc<HubMetrics>,
}

impl HubActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Register(subscriber) => self.register(subscriber),
                Command::Unregister(id) => self.unregister(id),
                Command::Publish(event) => self.fan_out(&event),
                Command::ObserverCount { run_id, reply } => {
                    let _ = reply.send(self.runs.get(&run_id).map_or(0, HashMap::len));
                }
                Command::Shutdown { done } => {
                    self.close_all();
                    rx.close();
                    let _ = done.send(());
                    break;
                }
            }
        }
        self.close_all();
    }

    fn register(&mut self, subscriber: Subscriber) {
        let id = subscriber.id();
        if self.index.contains_key(&id) {
            return;
        }
        let run_id = subscriber.run_id();
        self.index.insert(id, run_id);
        self.runs
            .entry(run_id)
            .or_default()
            .insert(id, subscriber);
        self.metrics.record_registration();
        debug!(%run_id, observer = %id, "Observer registered");
    }

    fn unregister(&mut self, id: ObserverId) {
        if self.remove(id) {
            debug!(observer = %id, "Observer unregistered");
        }
    }

    fn remove(&mut self, id: ObserverId) -> bool {
        let Some(run_id) = self.index.remove(&id) else {
            return false;
        };
        if let Some(observers) = self.runs.get_mut(&run_id) {
            observers.remove(&id);
            if observers.is_empty() {
                self.runs.remove(&run_id);
            }
        }
        true
    }

    fn fan_out(&mut self, event: &HubEvent) {
        self.metrics.record_publish();
        let run_id = event.run_id();
        let Some(observers) = self.runs.get(&run_id) else {
            return;
        };

        let mut dropped = Vec::new();
        for (id, subscriber) in observers {
            match subscriber.try_deliver(event.clone()) {
                Ok(()) => self.metrics.record_delivery(),
                Err(TrySendError::Full(_)) => {
                    warn!(%run_id, observer = %id, "Observer buffer full; evicting slow observer");
                    self.metrics.record_eviction();
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%run_id, observer = %id, "Observer went away");
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            self.remove(id);
        }
    }

    fn close_all(&mut self) {
        self.runs.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionStatus;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::error::TryRecvError;

    fn node_events(run_id: Uuid, n: usize) -> Vec<HubEvent> {
        (0..n).map(|i| HubEvent::running(run_id, format!("n{i}"))).collect()
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        let (sub, mut stream) = Subscriber::channel(run_id, 8);
        let twin = sub.twin();

        hub.register(sub);
        hub.register(twin);

        assert_eq!(hub.observer_count(run_id).await.unwrap(), 1);
        assert_eq!(hub.metrics().registered(), 1);

        // The rejected duplicate must not keep the stream alive.
        hub.unregister(stream.id());
        hub.observer_count(run_id).await.unwrap();
        assert!(stream.recv().await.is_none());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_eviction_closes_stream_while_sender_is_held() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        let (sub, mut stream) = Subscriber::channel(run_id, 1);
        let held = sub.raw_sender();
        hub.register(sub);

        let events = node_events(run_id, 2);
        for event in &events {
            hub.publish(event.clone());
        }
        assert_eq!(hub.observer_count(run_id).await.unwrap(), 0);
        assert_eq!(hub.metrics().evicted(), 1);

        assert_eq!(stream.drain(), events[..1].to_vec());
        assert_eq!(stream.try_recv(), Err(TryRecvError::Disconnected));
        assert!(held.try_send(events[1].clone()).is_err());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_unregister_closes_stream_while_sender_is_held() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        let (sub, mut stream) = Subscriber::channel(run_id, 4);
        let _held = sub.raw_sender();
        hub.register(sub);

        hub.unregister(stream.id());
        assert_eq!(hub.observer_count(run_id).await.unwrap(), 0);
        assert!(stream.recv().await.is_none());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_delivered_in_publish_order() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        let mut stream = hub.subscribe(run_id);

        let events = node_events(run_id, 5);
        for event in &events {
            hub.publish(event.clone());
        }
        hub.observer_count(run_id).await.unwrap();

        assert_eq!(stream.drain(), events);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_filtered_by_run() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();
        let mut stream_a = hub.subscribe(run_a);
        let mut stream_b = hub.subscribe(run_b);

        hub.publish(HubEvent::running(run_a, "A"));
        hub.publish(HubEvent::RunComplete {
            run_id: run_b,
            status: ExecutionStatus::Success,
            duration_ms: 3,
        });
        hub.observer_count(run_a).await.unwrap();

        let a = stream_a.drain();
        let b = stream_b.drain();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert!(b[0].is_run_complete());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_unregister_closes_stream() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        let mut stream = hub.subscribe(run_id);

        hub.unregister(stream.id());
        assert_eq!(hub.observer_count(run_id).await.unwrap(), 0);
        assert!(stream.recv().await.is_none());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_observer_evicted_without_blocking_others() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();

        let mut fast: Vec<EventStream> = (0..3)
            .map(|_| {
                let (sub, stream) = Subscriber::channel(run_id, 64);
                hub.register(sub);
                stream
            })
            .collect();
        let (stuck_sub, mut stuck) = Subscriber::channel(run_id, 2);
        hub.register(stuck_sub);
        assert_eq!(hub.observer_count(run_id).await.unwrap(), 4);

        let events = node_events(run_id, 10);
        for event in &events {
            hub.publish(event.clone());
        }

        assert_eq!(hub.observer_count(run_id).await.unwrap(), 3);
        assert_eq!(hub.metrics().evicted(), 1);
        for stream in &mut fast {
            assert_eq!(stream.drain(), events);
        }

        // The evicted observer keeps what was buffered, then ends.
        assert_eq!(stuck.drain(), events[..2].to_vec());
        assert_eq!(stuck.try_recv(), Err(TryRecvError::Disconnected));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_stream_is_removed_on_publish() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        drop(hub.subscribe(run_id));

        hub.publish(HubEvent::running(run_id, "A"));
        assert_eq!(hub.observer_count(run_id).await.unwrap(), 0);
        assert_eq!(hub.metrics().evicted(), 0);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        let mut stream = hub.subscribe(run_id);

        hub.shutdown().await;
        assert!(!hub.is_running());
        assert!(stream.recv().await.is_none());
        assert_eq!(hub.observer_count(run_id).await, Err(HubError::Closed));

        // Still safe after shutdown.
        hub.publish(HubEvent::running(run_id, "late"));
        let mut late = hub.subscribe(run_id);
        assert!(late.recv().await.is_none());
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn test_hub_as_progress_sink() {
        let hub = ProgressHub::start(HubConfig::default());
        let run_id = Uuid::new_v4();
        let mut stream = hub.subscribe(run_id);

        let sink: Arc<dyn ProgressSink> = hub.clone();
        sink.publish(HubEvent::running(run_id, "A"));

        let event = stream.recv().await.unwrap();
        assert_eq!(event.node_id(), Some("A"));
        assert_eq!(hub.metrics().published(), 1);
        assert_eq!(hub.metrics().delivered(), 1);
        hub.shutdown().await;
    }
}
