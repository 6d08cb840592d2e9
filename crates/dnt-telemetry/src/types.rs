//! Data model of the telemetry engine.

use chrono::NaiveTime;
use dnt_core::DntError;
use dnt_winmgmt::TaskTriggerSpec;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Artifacts ───────────────────────────────────────────────────────

/// Kind of OS object a telemetry artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Service,
    ScheduledTask,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::ScheduledTask => write!(f, "scheduled task"),
        }
    }
}

/// Enabled/disabled semantic state derived from OS attributes.
///
/// `Mixed` only appears when aggregating several artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalState {
    Enabled,
    Disabled,
    Mixed,
    Unknown,
}

impl LogicalState {
    /// Combine per-artifact states. Any `Unknown` wins; an empty set is `Unknown`.
    pub fn aggregate<I: IntoIterator<Item = LogicalState>>(states: I) -> Self {
        let mut acc: Option<LogicalState> = None;
        for state in states {
            acc = Some(match (acc, state) {
                (_, Self::Unknown) | (Some(Self::Unknown), _) => Self::Unknown,
                (None, s) => s,
                (Some(a), s) if a == s => a,
                _ => Self::Mixed,
            });
        }
        acc.unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for LogicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One matched OS object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryArtifact {
    pub kind: ArtifactKind,
    /// Service name or full task path.
    pub id: String,
    pub display_name: String,
    /// State at discovery time. Never reused across refreshes.
    pub state: LogicalState,
}

impl TelemetryArtifact {
    pub fn service(
        name: impl Into<String>,
        display_name: impl Into<String>,
        state: LogicalState,
    ) -> Self {
        Self {
            kind: ArtifactKind::Service,
            id: name.into(),
            display_name: display_name.into(),
            state,
        }
    }

    pub fn task(path: impl Into<String>, state: LogicalState) -> Self {
        let path = path.into();
        Self {
            kind: ArtifactKind::ScheduledTask,
            display_name: path.clone(),
            id: path,
            state,
        }
    }

    /// Label used in the report and the event view, e.g. `Service: NVIDIA Telemetry Container`.
    pub fn label(&self) -> String {
        match self.kind {
            ArtifactKind::Service => format!("Service: {}", self.display_name),
            ArtifactKind::ScheduledTask => format!("Task: {}", self.id),
        }
    }
}

// ─── Transitions ─────────────────────────────────────────────────────

/// Target of a transition. Only the two concrete states can be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetState {
    Enabled,
    Disabled,
}

impl TargetState {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Enabled => "enable",
            Self::Disabled => "disable",
        }
    }
}

impl From<TargetState> for LogicalState {
    fn from(t: TargetState) -> Self {
        match t {
            TargetState::Enabled => LogicalState::Enabled,
            TargetState::Disabled => LogicalState::Disabled,
        }
    }
}

/// A batch transition request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub target: TargetState,
    pub artifacts: Vec<TelemetryArtifact>,
    /// Services only: stop a running instance before disabling it.
    #[serde(default)]
    pub stop_running_instance: bool,
    #[serde(default)]
    pub emit_log: bool,
}

impl TransitionRequest {
    pub fn new(target: TargetState, artifacts: Vec<TelemetryArtifact>) -> Self {
        Self {
            target,
            artifacts,
            stop_running_instance: false,
            emit_log: false,
        }
    }

    pub fn disable(artifacts: Vec<TelemetryArtifact>) -> Self {
        Self::new(TargetState::Disabled, artifacts)
    }

    pub fn enable(artifacts: Vec<TelemetryArtifact>) -> Self {
        Self::new(TargetState::Enabled, artifacts)
    }

    pub fn stop_running(mut self, stop: bool) -> Self {
        self.stop_running_instance = stop;
        self
    }

    pub fn logged(mut self, emit: bool) -> Self {
        self.emit_log = emit;
        self
    }
}

/// Outcome for one artifact of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    pub kind: ArtifactKind,
    pub id: String,
    pub succeeded: bool,
    pub error: Option<DntError>,
}

impl TransitionResult {
    pub fn ok(artifact: &TelemetryArtifact) -> Self {
        Self {
            kind: artifact.kind,
            id: artifact.id.clone(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(artifact: &TelemetryArtifact, error: DntError) -> Self {
        Self {
            kind: artifact.kind,
            id: artifact.id.clone(),
            succeeded: false,
            error: Some(error),
        }
    }
}

// ─── Self-task ───────────────────────────────────────────────────────

/// Recurrence policy of the application's own scheduled task.
///
/// Persisted as an index: 0 AtLogon, 1 Daily, 2 Hourly, 3 OnIdle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelfTaskTrigger {
    #[default]
    AtLogon,
    Daily,
    Hourly,
    OnIdle,
}

impl SelfTaskTrigger {
    pub const ALL: [SelfTaskTrigger; 4] = [Self::AtLogon, Self::Daily, Self::Hourly, Self::OnIdle];

    /// Out-of-range indices fall back to the default.
    pub fn from_index(index: i32) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or_else(|| {
                warn!(
                    "Unknown background task trigger index {}, using {:?}",
                    index,
                    Self::default()
                );
                Self::default()
            })
    }

    pub fn to_index(self) -> i32 {
        match self {
            Self::AtLogon => 0,
            Self::Daily => 1,
            Self::Hourly => 2,
            Self::OnIdle => 3,
        }
    }

    /// The one OS trigger this policy maps to.
    pub fn to_spec(self, daily_at: NaiveTime) -> TaskTriggerSpec {
        match self {
            Self::AtLogon => TaskTriggerSpec::AtLogon,
            Self::Daily => TaskTriggerSpec::Daily { at: daily_at },
            Self::Hourly => TaskTriggerSpec::Hourly,
            Self::OnIdle => TaskTriggerSpec::OnIdle,
        }
    }

    pub fn from_spec(spec: &TaskTriggerSpec) -> Self {
        match spec {
            TaskTriggerSpec::AtLogon => Self::AtLogon,
            TaskTriggerSpec::Daily { .. } => Self::Daily,
            TaskTriggerSpec::Hourly => Self::Hourly,
            TaskTriggerSpec::OnIdle => Self::OnIdle,
        }
    }
}

impl fmt::Display for SelfTaskTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AtLogon => "logon",
            Self::Daily => "daily",
            Self::Hourly => "hourly",
            Self::OnIdle => "idle",
        };
        f.write_str(s)
    }
}

impl FromStr for SelfTaskTrigger {
    type Err = DntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logon" | "atlogon" | "at-logon" => Ok(Self::AtLogon),
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "idle" | "onidle" | "on-idle" => Ok(Self::OnIdle),
            other => Err(DntError::invalid_input(format!(
                "Unknown trigger '{}', expected one of: logon, daily, hourly, idle",
                other
            ))),
        }
    }
}

/// The application's own task as currently registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfTaskHandle {
    pub path: String,
    /// `None` when the registered trigger is not one this application creates.
    pub trigger: Option<SelfTaskTrigger>,
    pub enabled: bool,
}
