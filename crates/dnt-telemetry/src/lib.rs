//! # dnt – Telemetry Engine
//!
//! Finds vendor telemetry services and scheduled tasks, reports their
//! enabled/disabled state and switches them:
//!
//! - **Matching** – ordered signature table (exact, substring, path prefix),
//!   re-evaluated on every enumeration
//! - **Inspection** – logical state from start mode / task enabled flag
//! - **Transitions** – ordered per-artifact application with isolated failures
//! - **Self-task** – create / replace / remove the application's own
//!   recurring scheduled task
//! - **Selection** – tri-state aggregate over per-item checkboxes

pub mod types;
pub mod signature;
pub mod config;
pub mod inspector;
pub mod matcher;
pub mod transition;
pub mod self_task;
pub mod selection;
pub mod service;

pub use config::TelemetryConfig;
pub use inspector::StateInspector;
pub use matcher::ArtifactMatcher;
pub use selection::{CheckState, SelectionState};
pub use self_task::SelfTaskManager;
pub use service::{BatchSummary, TelemetryReport, TelemetryService};
pub use signature::{MatchMode, SignaturePattern, SignatureSet};
pub use transition::TransitionEngine;
pub use types::*;
