//! Log sink for per-artifact action records.
//!
//! The transition engine writes one [`LogEntry`] per artifact action to a
//! [`LogSink`]. Hosts decide where entries end up: the `log` facade
//! ([`TracingLogSink`]), an in-memory event view ([`MemoryLogSink`]), or both
//! ([`FanoutLogSink`]).

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    Info,
    Error,
}

/// A single leveled log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// When set, hosts must not raise a user-facing notification for this entry.
    #[serde(default)]
    pub suppress_notification: bool,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
            suppress_notification: false,
            timestamp: Local::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
            suppress_notification: false,
            timestamp: Local::now(),
        }
    }

    pub fn suppressed(mut self) -> Self {
        self.suppress_notification = true;
        self
    }

    /// `[HH:MM:SS] message`, the format of the event view.
    pub fn display_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Destination for leveled log entries.
pub trait LogSink: Send + Sync {
    fn record(&self, entry: &LogEntry);
}

/// Forwards entries to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn record(&self, entry: &LogEntry) {
        match entry.level {
            LogLevel::Info => log::info!(target: "dnt::actions", "{}", entry.message),
            LogLevel::Error => log::error!(target: "dnt::actions", "{}", entry.message),
        }
    }
}

/// Keeps the most recent entries in memory.
#[derive(Debug, Clone)]
pub struct MemoryLogSink {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Entries a host should surface to the user.
    pub fn notifications(&self) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| !e.suppress_notification)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemoryLogSink {
    fn record(&self, entry: &LogEntry) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(entry.clone());
    }
}

/// Writes every entry to each inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutLogSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl LogSink for FanoutLogSink {
    fn record(&self, entry: &LogEntry) {
        for sink in &self.sinks {
            sink.record(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_capacity() {
        let sink = MemoryLogSink::with_capacity(2);
        sink.record(&LogEntry::info("one"));
        sink.record(&LogEntry::info("two"));
        sink.record(&LogEntry::error("three"));
        let messages: Vec<_> = sink.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn test_notifications_skip_suppressed() {
        let sink = MemoryLogSink::new();
        sink.record(&LogEntry::info("visible"));
        sink.record(&LogEntry::error("hidden").suppressed());
        let notes = sink.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "visible");
        assert_eq!(sink.len(), 2);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_fanout_reaches_all() {
        let a = Arc::new(MemoryLogSink::new());
        let b = Arc::new(MemoryLogSink::new());
        let fan = FanoutLogSink::new().with(a.clone()).with(b.clone());
        fan.record(&LogEntry::info("hello"));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_display_line_format() {
        let line = LogEntry::info("Disabled service NvTelemetryContainer").display_line();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] Disabled service NvTelemetryContainer"));
    }
}
