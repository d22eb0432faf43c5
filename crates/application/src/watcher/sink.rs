//! Bounded event channel between an event source and the reconcile worker.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use super::event::RawEvent;

/// Creates a channel holding at most `capacity` undelivered events.
#[must_use]
pub fn event_channel(capacity: usize) -> (EventSink, EventStream) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let overflow = Arc::new(Notify::new());
    (
        EventSink {
            sender,
            overflow: Arc::clone(&overflow),
        },
        EventStream { receiver, overflow },
    )
}

/// Sending half, handed to an [`EventSource`](crate::ports::EventSource).
///
/// Never blocks. An event that does not fit is dropped and the receiving
/// worker is told to rescan once the burst is over.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::Sender<RawEvent>,
    overflow: Arc<Notify>,
}

impl EventSink {
    /// Queues `event`. Returns false once the receiving side is gone.
    pub fn send(&self, event: RawEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(path = %dropped.path.display(), "Event channel full, scheduling rescan");
                self.overflow.notify_one();
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Returns true once the receiving side is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving half, consumed by the reconcile worker.
#[derive(Debug)]
pub struct EventStream {
    pub(crate) receiver: mpsc::Receiver<RawEvent>,
    pub(crate) overflow: Arc<Notify>,
}

impl EventStream {
    /// Waits for the next event. `None` once every sink is dropped.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.receiver.recv().await
    }

    /// Takes the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<RawEvent> {
        self.receiver.try_recv().ok()
    }

    /// Completes once an event has been dropped since the last call.
    pub async fn overflowed(&self) {
        self.overflow.notified().await;
    }
}
