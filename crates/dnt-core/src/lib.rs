//! # Disable Nvidia Telemetry – Core
//!
//! Shared error taxonomy, the action log sink, and persisted user settings.

pub mod error;
pub mod logging;
pub mod settings;

pub use error::{DntError, DntErrorKind, DntResult};
pub use logging::{FanoutLogSink, LogEntry, LogLevel, LogSink, MemoryLogSink, TracingLogSink};
pub use settings::{Settings, SettingsStore};
