//! Notification bus between the engine and its hosts.
//!
//! A thin wrapper over `tokio::sync::broadcast`: every subscriber sees
//! every event published after it subscribed, in publish order. There is
//! no replay for late subscribers. A subscriber that falls more than the
//! bus capacity behind receives `Lagged` and skips ahead.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::feed::MessageBatch;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The polling loop was started.
    Connected,
    /// The polling loop was stopped by `disconnect()`.
    Disconnected,
    /// A new batch arrived. The first batch after connecting is never
    /// published; it only positions the cursor.
    MessagesReceived(MessageBatch),
    /// The polling loop terminated on its own because of an error.
    PollingFailed {
        /// Rendered error.
        error: String,
    },
}

impl ChatEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::MessagesReceived(_) => "messages_received",
            Self::PollingFailed { .. } => "polling_failed",
        }
    }
}

/// Multi-subscriber FIFO event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`.
    pub fn stream(&self) -> BroadcastStream<ChatEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Deliver an event to all current subscribers.
    pub fn publish(&self, event: ChatEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            trace!(kind, "event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
