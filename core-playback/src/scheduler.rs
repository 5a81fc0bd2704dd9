//! # Playback Thread Messaging
//!
//! Media periods and sources report progress from loader threads. Those
//! reports are marshaled onto the playback thread as [`PlaybackMessage`]s
//! over an unbounded `tokio::sync::mpsc` channel; the playback driver is the
//! only receiver and applies them to the queue in order.

use crate::holder::HolderId;
use crate::traits::SourceInfoRefreshListener;
use tokio::sync::mpsc;
use tracing::trace;

/// Work for the playback thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackMessage {
    /// The period of this holder finished preparing.
    PeriodPrepared(HolderId),
    /// The period of this holder asked to continue loading.
    ContinueLoadingRequested(HolderId),
    /// The source's timeline changed.
    SourceInfoRefreshed,
}

/// Sending half, cloned into every period callback and source listener.
#[derive(Debug, Clone)]
pub struct PlaybackSender {
    sender: mpsc::UnboundedSender<PlaybackMessage>,
}

impl PlaybackSender {
    /// Returns `false` if the playback thread is gone.
    pub fn send(&self, message: PlaybackMessage) -> bool {
        match self.sender.send(message) {
            Ok(()) => true,
            Err(_) => {
                trace!(?message, "Playback receiver dropped; message discarded");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl SourceInfoRefreshListener for PlaybackSender {
    fn on_source_info_refreshed(&self) {
        self.send(PlaybackMessage::SourceInfoRefreshed);
    }
}

/// Receiving half, owned by the playback driver.
#[derive(Debug)]
pub struct PlaybackReceiver {
    receiver: mpsc::UnboundedReceiver<PlaybackMessage>,
}

impl PlaybackReceiver {
    pub fn try_recv(&mut self) -> Option<PlaybackMessage> {
        self.receiver.try_recv().ok()
    }

    /// Takes every message currently queued, without waiting.
    pub fn drain(&mut self) -> Vec<PlaybackMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Waits for the next message. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<PlaybackMessage> {
        self.receiver.recv().await
    }
}

/// Creates a connected sender/receiver pair.
pub fn channel() -> (PlaybackSender, PlaybackReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (PlaybackSender { sender }, PlaybackReceiver { receiver })
}
