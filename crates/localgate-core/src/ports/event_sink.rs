//! Event sink trait for operator-visible state and log events.
//!
//! Components receive a sink at construction instead of reaching for a
//! process-wide logger. Implementations handle transport details
//! (in-memory log buffer, broadcast channel, tracing).

use crate::events::GatewayEvent;

/// Trait for emitting gateway events.
///
/// Fire-and-forget: implementations must not block and must not fail.
pub trait EventSink: Send + Sync {
    /// Emit a gateway event.
    fn emit(&self, event: GatewayEvent);

    /// Clone this sink into a boxed trait object.
    fn clone_box(&self) -> Box<dyn EventSink>;

    /// Convenience for free-form log lines.
    fn log(&self, message: &str) {
        self.emit(GatewayEvent::log(message));
    }
}

/// A no-op sink for tests and contexts without an observer.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl NoopSink {
    /// Create a new no-op sink.
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for NoopSink {
    fn emit(&self, _event: GatewayEvent) {}

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_sink() {
        let sink = NoopSink::new();
        sink.emit(GatewayEvent::log("ignored"));
        sink.log("also ignored");
    }

    #[test]
    fn test_arc_sink() {
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink::new());
        sink.log("hello");
        let _boxed: Box<dyn EventSink> = sink.clone_box();
    }
}
