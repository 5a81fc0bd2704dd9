//! # Queue Events
//!
//! Observable changes of the media period queue, published on a
//! `tokio::sync::broadcast` channel.
//!
//! ## Usage
//!
//! ```rust
//! use core_playback::events::{EventBus, QueueEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(QueueEvent::QueueCleared).ok();
//! assert_eq!(subscriber.recv().await.unwrap(), QueueEvent::QueueCleared);
//! # }
//! ```
//!
//! Emitting without subscribers returns an error; the queue ignores it.
//! Slow subscribers receive `RecvError::Lagged` and may keep reading.

use crate::holder::HolderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum QueueEvent {
    /// A holder was appended as the new loading holder.
    PeriodEnqueued {
        holder: HolderId,
        period: String,
        renderer_offset_us: i64,
        start_position_us: i64,
    },
    /// A preloaded holder was moved into the queue instead of creating a new one.
    PreloadReused { holder: HolderId, period: String },
    /// A holder finished preparation and applied its first track selection.
    PeriodPrepared {
        holder: HolderId,
        period: String,
        start_position_us: i64,
    },
    /// Renderers started reading from this holder.
    ReadingAdvanced { holder: HolderId, period: String },
    /// This holder became the playing holder.
    PlayingAdvanced { holder: HolderId, period: String },
    /// Holders were removed from the back of the queue.
    PeriodsRemoved { count: usize },
    /// Every holder was released.
    QueueCleared,
    /// The loading holder reported a loading error.
    LoadingError { period: String, message: String },
}

impl QueueEvent {
    pub fn description(&self) -> &str {
        match self {
            QueueEvent::PeriodEnqueued { .. } => "Period enqueued",
            QueueEvent::PreloadReused { .. } => "Preloaded period reused",
            QueueEvent::PeriodPrepared { .. } => "Period prepared",
            QueueEvent::ReadingAdvanced { .. } => "Reading period advanced",
            QueueEvent::PlayingAdvanced { .. } => "Playing period advanced",
            QueueEvent::PeriodsRemoved { .. } => "Periods removed",
            QueueEvent::QueueCleared => "Queue cleared",
            QueueEvent::LoadingError { .. } => "Loading error",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            QueueEvent::LoadingError { .. } => EventSeverity::Error,
            QueueEvent::PeriodsRemoved { .. } | QueueEvent::QueueCleared => EventSeverity::Info,
            QueueEvent::PlayingAdvanced { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Broadcast channel for [`QueueEvent`]s. Clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<QueueEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: QueueEvent) -> Result<usize, SendError<QueueEvent>> {
        self.sender.send(event)
    }

    /// Each call creates an independent receiver of all future events.
    pub fn subscribe(&self) -> Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
