//! Engine configuration, fixed at startup and passed into each component.

use crate::signature::SignatureSet;
use chrono::NaiveTime;
use dnt_winmgmt::{HostConfig, ServiceStartMode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SELF_TASK_NAME: &str = "Disable Nvidia Telemetry";
pub const SILENT_ARGUMENT: &str = "silent";

/// Configuration for matcher, transition engine and self-task manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    #[serde(default)]
    pub signatures: SignatureSet,
    /// Start mode applied when a service is enabled again.
    #[serde(default = "default_enable_start_mode")]
    pub enable_start_mode: ServiceStartMode,
    #[serde(default = "default_self_task_name")]
    pub self_task_name: String,
    /// Executable the self-task launches. `None` resolves to the current exe.
    #[serde(default)]
    pub self_task_executable: Option<String>,
    #[serde(default = "default_self_task_arguments")]
    pub self_task_arguments: String,
    /// Start time for the `Daily` trigger.
    #[serde(default = "default_daily_at")]
    pub daily_at: NaiveTime,
    #[serde(default)]
    pub host: HostConfig,
}

fn default_enable_start_mode() -> ServiceStartMode {
    ServiceStartMode::Manual
}

fn default_self_task_name() -> String {
    DEFAULT_SELF_TASK_NAME.to_string()
}

fn default_self_task_arguments() -> String {
    SILENT_ARGUMENT.to_string()
}

fn default_daily_at() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            signatures: SignatureSet::default(),
            enable_start_mode: default_enable_start_mode(),
            self_task_name: default_self_task_name(),
            self_task_executable: None,
            self_task_arguments: default_self_task_arguments(),
            daily_at: default_daily_at(),
            host: HostConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Root-folder task path of the self-task.
    pub fn self_task_path(&self) -> String {
        if self.self_task_name.starts_with('\\') {
            self.self_task_name.clone()
        } else {
            format!("\\{}", self.self_task_name)
        }
    }

    /// Executable for the self-task action.
    pub fn resolve_executable(&self) -> String {
        if let Some(exe) = &self.self_task_executable {
            return exe.clone();
        }
        std::env::current_exe()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| "dnt.exe".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TelemetryConfig::default();
        assert_eq!(cfg.enable_start_mode, ServiceStartMode::Manual);
        assert_eq!(cfg.self_task_path(), "\\Disable Nvidia Telemetry");
        assert_eq!(cfg.self_task_arguments, "silent");
        assert!(!cfg.signatures.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: TelemetryConfig =
            serde_json::from_str(r#"{"enableStartMode":"auto","selfTaskExecutable":"C:\\dnt.exe"}"#)
                .unwrap();
        assert_eq!(cfg.enable_start_mode, ServiceStartMode::Auto);
        assert_eq!(cfg.resolve_executable(), "C:\\dnt.exe");
        assert_eq!(cfg.self_task_name, DEFAULT_SELF_TASK_NAME);
        assert_eq!(cfg.signatures, SignatureSet::default());
    }
}
