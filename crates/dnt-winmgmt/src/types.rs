//! Shared types for local Windows service and scheduled task management.
//!
//! Mirrors the parts of `Win32_Service` and `MSFT_ScheduledTask` the
//! telemetry engine needs, plus the definition used to register a task.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ─── Windows Services (Win32_Service) ────────────────────────────────

/// Subset of the Win32_Service CIM class.
/// Ref: <https://learn.microsoft.com/en-us/windows/win32/cimwin32prov/win32-service>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsService {
    pub name: String,
    pub display_name: String,
    pub state: ServiceState,
    pub start_mode: ServiceStartMode,
}

impl WindowsService {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        start_mode: ServiceStartMode,
        state: ServiceState,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            state,
            start_mode,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ServiceState::Running
    }
}

/// Service run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceState {
    Running,
    Stopped,
    StartPending,
    StopPending,
    ContinuePending,
    PausePending,
    Paused,
    Unknown,
}

impl ServiceState {
    pub fn from_wmi(s: &str) -> Self {
        match s {
            "Running" => Self::Running,
            "Stopped" => Self::Stopped,
            "Start Pending" => Self::StartPending,
            "Stop Pending" => Self::StopPending,
            "Continue Pending" => Self::ContinuePending,
            "Pause Pending" => Self::PausePending,
            "Paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }
}

/// Service start mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceStartMode {
    Auto,
    Manual,
    Disabled,
    Boot,
    System,
    Unknown,
}

impl ServiceStartMode {
    pub fn from_wmi(s: &str) -> Self {
        match s {
            "Auto" | "Automatic" => Self::Auto,
            "Manual" => Self::Manual,
            "Disabled" => Self::Disabled,
            "Boot" => Self::Boot,
            "System" => Self::System,
            _ => Self::Unknown,
        }
    }

    /// Value accepted by `Set-Service -StartupType`.
    pub fn to_startup_type(&self) -> &'static str {
        match self {
            Self::Auto => "Automatic",
            Self::Disabled => "Disabled",
            Self::Manual | Self::Boot | Self::System | Self::Unknown => "Manual",
        }
    }
}

// ─── Scheduled Tasks (MSFT_ScheduledTask) ────────────────────────────

/// Subset of MSFT_ScheduledTask (via Get-ScheduledTask / CIM).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    /// Folder, always with leading and trailing backslash (`\` for the root).
    pub task_path: String,
    pub task_name: String,
    pub state: ScheduledTaskState,
    pub enabled: bool,
    pub description: Option<String>,
    /// CIM class names of the task's triggers (e.g. `MSFT_TaskLogonTrigger`).
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl ScheduledTask {
    pub fn new(full_path: &str, enabled: bool) -> Self {
        let (task_path, task_name) = split_task_path(full_path);
        Self {
            task_path,
            task_name,
            state: if enabled {
                ScheduledTaskState::Ready
            } else {
                ScheduledTaskState::Disabled
            },
            enabled,
            description: None,
            triggers: Vec::new(),
        }
    }

    /// Folder plus name, e.g. `\NVIDIA\NvTmMon`.
    pub fn full_path(&self) -> String {
        format!("{}{}", self.task_path, self.task_name)
    }
}

/// Scheduled task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduledTaskState {
    Unknown,
    Disabled,
    Queued,
    Ready,
    Running,
}

impl ScheduledTaskState {
    pub fn from_value(v: u32) -> Self {
        match v {
            1 => Self::Disabled,
            2 => Self::Queued,
            3 => Self::Ready,
            4 => Self::Running,
            _ => Self::Unknown,
        }
    }
}

/// Split `\Folder\Sub\Name` into (`\Folder\Sub\`, `Name`).
pub fn split_task_path(full_path: &str) -> (String, String) {
    let normalized = if full_path.starts_with('\\') {
        full_path.to_string()
    } else {
        format!("\\{}", full_path)
    };
    match normalized.rfind('\\') {
        Some(idx) => (
            normalized[..=idx].to_string(),
            normalized[idx + 1..].to_string(),
        ),
        None => ("\\".to_string(), normalized),
    }
}

// ─── Task registration ───────────────────────────────────────────────

/// Executable action of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAction {
    pub execute: String,
    pub arguments: Option<String>,
    pub working_directory: Option<String>,
}

/// One OS-native trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TaskTriggerSpec {
    AtLogon,
    Daily { at: NaiveTime },
    Hourly,
    OnIdle,
}

impl TaskTriggerSpec {
    pub fn cim_class(&self) -> &'static str {
        match self {
            Self::AtLogon => "MSFT_TaskLogonTrigger",
            Self::Daily { .. } => "MSFT_TaskDailyTrigger",
            Self::Hourly => "MSFT_TaskTimeTrigger",
            Self::OnIdle => "MSFT_TaskIdleTrigger",
        }
    }

    /// Inverse of [`cim_class`](Self::cim_class). Daily triggers read back with
    /// midnight since the start time is not part of the class name.
    pub fn from_cim_class(class: &str) -> Option<Self> {
        match class {
            "MSFT_TaskLogonTrigger" => Some(Self::AtLogon),
            "MSFT_TaskDailyTrigger" => Some(Self::Daily {
                at: NaiveTime::default(),
            }),
            "MSFT_TaskTimeTrigger" => Some(Self::Hourly),
            "MSFT_TaskIdleTrigger" => Some(Self::OnIdle),
            _ => None,
        }
    }
}

/// Everything needed to register (or replace) a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    /// Full path, e.g. `\Disable Nvidia Telemetry`.
    pub path: String,
    pub description: Option<String>,
    pub action: TaskAction,
    pub trigger: TaskTriggerSpec,
    /// Run as SYSTEM with highest privileges so no interactive session is needed.
    pub run_elevated: bool,
}

// ─── Host configuration ──────────────────────────────────────────────

/// Configuration for the PowerShell-backed host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Path to the PowerShell executable.
    #[serde(default = "default_powershell_path")]
    pub powershell_path: String,
    /// Per-invocation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_powershell_path() -> String {
    "powershell.exe".to_string()
}

fn default_timeout() -> u64 {
    60
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            powershell_path: default_powershell_path(),
            timeout_seconds: default_timeout(),
        }
    }
}
