//! Bounded in-memory log of operator-visible events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use localgate_core::{EventSink, GatewayEvent};

/// Number of entries kept before the oldest are dropped.
pub const LOG_STORE_CAPACITY: usize = 200;

/// Ring buffer of `[HH:MM:SS.mmm] message` lines.
///
/// Clones share the same buffer.
#[derive(Debug, Clone)]
pub struct LogStore {
    entries: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(LOG_STORE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Append a line stamped with the current local time.
    pub fn add(&self, message: &str) {
        self.add_at(Local::now(), message);
    }

    fn add_at(&self, at: DateTime<Local>, message: &str) {
        let line = format!("[{}] {message}", at.format("%H:%M:%S%.3f"));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(line);
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for LogStore {
    /// Resource samples are not operator log lines and are skipped.
    fn emit(&self, event: GatewayEvent) {
        if !matches!(event, GatewayEvent::SystemStats { .. }) {
            self.add(&event.describe());
        }
    }

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }
}
