//! Observer handles: the hub-side [`Subscriber`] and the caller-side
//! [`EventStream`].

use crate::core::HubEvent;
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Identity of one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Generates a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The delivery end of an observer, handed to the hub on registration.
///
/// Owned by the hub once registered. Dropping it closes the paired
/// [`EventStream`] even if other senders into the buffer are still alive.
#[derive(Debug)]
pub struct Subscriber {
    id: ObserverId,
    run_id: Uuid,
    tx: mpsc::Sender<HubEvent>,
    _close: oneshot::Sender<()>,
}

impl Subscriber {
    /// Creates a linked subscriber and stream with a bounded buffer.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn channel(run_id: Uuid, capacity: usize) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (close_tx, close_rx) = oneshot::channel();
        let id = ObserverId::new();
        (
            Self {
                id,
                run_id,
                tx,
                _close: close_tx,
            },
            EventStream {
                id,
                run_id,
                rx,
                close: close_rx,
                closed: false,
            },
        )
    }

    /// The observer id.
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// The run this observer follows.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(super) fn try_deliver(&self, event: HubEvent) -> Result<(), TrySendError<HubEvent>> {
        self.tx.try_send(event)
    }

    /// A second handle with the same id whose own close signal is unused.
    #[cfg(test)]
    pub(super) fn twin(&self) -> Self {
        Self {
            id: self.id,
            run_id: self.run_id,
            tx: self.tx.clone(),
            _close: oneshot::channel().0,
        }
    }

    /// A raw sender into the observer buffer that outlives this handle.
    #[cfg(test)]
    pub(super) fn raw_sender(&self) -> mpsc::Sender<HubEvent> {
        self.tx.clone()
    }
}

/// The receiving end of an observer.
///
/// Yields events for one run in publish order. Once the observer is
/// unregistered, evicted or the hub shuts down, the buffered events are
/// still yielded and then the stream ends.
#[derive(Debug)]
pub struct EventStream {
    id: ObserverId,
    run_id: Uuid,
    rx: mpsc::Receiver<HubEvent>,
    close: oneshot::Receiver<()>,
    closed: bool,
}

impl EventStream {
    /// The observer id, for [`super::ProgressHub::unregister`].
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// The run this stream follows.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Receives the next event, or `None` once the stream is closed and drained.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        futures::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    /// Receives a buffered event without waiting.
    ///
    /// # Errors
    ///
    /// Returns `Empty` when nothing is buffered and `Disconnected` once the
    /// hub has dropped this observer and the buffer is drained.
    pub fn try_recv(&mut self) -> Result<HubEvent, TryRecvError> {
        match self.rx.try_recv() {
            Err(TryRecvError::Empty) if self.check_closed() => self
                .rx
                .try_recv()
                .map_err(|_| TryRecvError::Disconnected),
            other => other,
        }
    }

    /// Drains everything currently buffered.
    pub fn drain(&mut self) -> Vec<HubEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<HubEvent>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(event) => Poll::Ready(event),
            Poll::Pending if self.closed => Poll::Ready(None),
            Poll::Pending => match Pin::new(&mut self.close).poll(cx) {
                Poll::Ready(_) => {
                    self.mark_closed();
                    // Nothing can be sent after close, so one more pass
                    // settles whether anything raced in.
                    match self.rx.try_recv() {
                        Ok(event) => Poll::Ready(Some(event)),
                        Err(_) => Poll::Ready(None),
                    }
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }

    /// Returns true once the hub side has gone, closing the buffer to
    /// further sends.
    fn check_closed(&mut self) -> bool {
        if !self.closed
            && matches!(
                self.close.try_recv(),
                Err(oneshot::error::TryRecvError::Closed)
            )
        {
            self.mark_closed();
        }
        self.closed
    }

    fn mark_closed(&mut self) {
        self.closed = true;
        self.rx.close();
    }
}

impl Stream for EventStream {
    type Item = HubEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_event(cx)
    }
}
