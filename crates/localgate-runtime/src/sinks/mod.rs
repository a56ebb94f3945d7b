//! [`EventSink`](localgate_core::EventSink) implementations.
//!
//! - [`TracingSink`] writes events to the `tracing` subscriber.
//! - [`LogStore`] keeps a bounded, timestamped buffer of recent lines.
//! - [`BroadcastSink`] fans events out to live subscribers.
//! - [`FanoutSink`] forwards every event to several sinks.

mod broadcast;
mod log_store;

pub use broadcast::BroadcastSink;
pub use log_store::{LOG_STORE_CAPACITY, LogStore};

use localgate_core::{EventSink, GatewayEvent};

/// Sink that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: GatewayEvent) {
        match &event {
            GatewayEvent::ModelStateChanged { error: Some(_), .. }
            | GatewayEvent::ServerStateChanged { error: Some(_), .. } => {
                tracing::warn!(target: "localgate::events", "{}", event.describe());
            }
            GatewayEvent::SystemStats { .. } => {
                tracing::trace!(target: "localgate::events", "{}", event.describe());
            }
            _ => tracing::info!(target: "localgate::events", "{}", event.describe()),
        }
    }

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(*self)
    }
}

/// Sink forwarding each event to every inner sink, in order.
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: GatewayEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(Self {
            sinks: self.sinks.iter().map(|s| s.clone_box()).collect(),
        })
    }
}
