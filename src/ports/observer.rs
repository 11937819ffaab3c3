//! Built-in [`SyncObserver`] implementations.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{error, info, warn};

use super::traits::SyncObserver;

/// Discards everything. Used when the caller supplies no observer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// Forwards events to `tracing` under the `lease_sync::observer` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn event(&self, name: &str, meta: &Value) {
        info!(target: "lease_sync::observer", event = name, meta = %meta);
    }

    fn warn(&self, name: &str, meta: &Value) {
        warn!(target: "lease_sync::observer", event = name, meta = %meta);
    }

    fn error(&self, err: &(dyn std::error::Error + Send + Sync), meta: &Value) {
        error!(target: "lease_sync::observer", error = %err, meta = %meta);
    }
}

/// Severity of a recorded observer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedLevel {
    Event,
    Warn,
    Error,
}

/// A single observer call captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEvent {
    pub level: ObservedLevel,
    /// Event name, or the error's display text for `Error`
    pub name: String,
    pub meta: Value,
}

/// Keeps every call in memory; handy for asserting on run behaviour.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    /// Names of calls recorded at `level`, in order.
    #[must_use]
    pub fn names(&self, level: ObservedLevel) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.name.clone())
            .collect()
    }

    fn push(&self, level: ObservedLevel, name: String, meta: &Value) {
        self.events.lock().push(ObservedEvent { level, name, meta: meta.clone() });
    }
}

impl SyncObserver for RecordingObserver {
    fn event(&self, name: &str, meta: &Value) {
        self.push(ObservedLevel::Event, name.to_string(), meta);
    }

    fn warn(&self, name: &str, meta: &Value) {
        self.push(ObservedLevel::Warn, name.to_string(), meta);
    }

    fn error(&self, err: &(dyn std::error::Error + Send + Sync), meta: &Value) {
        self.push(ObservedLevel::Error, err.to_string(), meta);
    }
}
