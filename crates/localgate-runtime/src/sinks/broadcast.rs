//! Broadcast sink for live event observers.

use localgate_core::{EventSink, GatewayEvent};
use tokio::sync::broadcast;

/// Sends events to every subscribed receiver.
///
/// Slow receivers may miss events if the buffer overflows; emitting
/// without subscribers drops the event.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<GatewayEvent>,
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a sink with default capacity (256 events).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(256)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: GatewayEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }
}
