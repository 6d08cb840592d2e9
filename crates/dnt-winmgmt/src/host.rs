//! Aggregate host facade for the local Windows management crate.
//!
//! Owns the `PsExecutor` and delegates to the service and scheduled task
//! managers, exposing both OS interfaces from one object.

use crate::powershell::{PsExecutor, ScriptRunner};
use crate::scheduled_tasks::{ScheduledTaskManager, TaskScheduler};
use crate::services::{ServiceControl, ServiceManager};
use crate::types::*;
use async_trait::async_trait;
use dnt_core::DntResult;
use std::sync::Arc;

/// PowerShell-backed implementation of [`ServiceControl`] and [`TaskScheduler`].
#[derive(Clone)]
pub struct PowerShellHost {
    ps: PsExecutor,
    config: HostConfig,
}

impl PowerShellHost {
    /// Create a new host with default config.
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    /// Create a new host with custom config.
    pub fn with_config(config: HostConfig) -> Self {
        Self {
            ps: PsExecutor::new(&config),
            config,
        }
    }

    /// Create a host that sends scripts to `runner` instead of a process.
    pub fn with_runner(config: HostConfig, runner: Arc<dyn ScriptRunner>) -> Self {
        Self {
            ps: PsExecutor::with_runner(runner),
            config,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

impl Default for PowerShellHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceControl for PowerShellHost {
    async fn list_services(&self) -> DntResult<Vec<WindowsService>> {
        ServiceManager::list_services(&self.ps).await
    }

    async fn get_service(&self, name: &str) -> DntResult<WindowsService> {
        ServiceManager::get_service(&self.ps, name).await
    }

    async fn set_start_mode(&self, name: &str, mode: ServiceStartMode) -> DntResult<()> {
        ServiceManager::set_start_mode(&self.ps, name, mode).await
    }

    async fn stop_service(&self, name: &str) -> DntResult<()> {
        ServiceManager::stop_service(&self.ps, name).await
    }

    async fn start_service(&self, name: &str) -> DntResult<()> {
        ServiceManager::start_service(&self.ps, name).await
    }
}

#[async_trait]
impl TaskScheduler for PowerShellHost {
    async fn list_tasks(&self) -> DntResult<Vec<ScheduledTask>> {
        ScheduledTaskManager::list_tasks(&self.ps).await
    }

    async fn get_task(&self, path: &str) -> DntResult<ScheduledTask> {
        ScheduledTaskManager::get_task(&self.ps, path).await
    }

    async fn set_task_enabled(&self, path: &str, enabled: bool) -> DntResult<()> {
        ScheduledTaskManager::set_enabled(&self.ps, path, enabled).await
    }

    async fn register_task(&self, definition: &TaskDefinition) -> DntResult<()> {
        ScheduledTaskManager::register_task(&self.ps, definition).await
    }

    async fn unregister_task(&self, path: &str) -> DntResult<()> {
        ScheduledTaskManager::unregister_task(&self.ps, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::powershell::testing::ScriptedRunner;
    use crate::powershell::PsOutput;

    #[test]
    fn test_default_config() {
        let host = PowerShellHost::new();
        assert_eq!(host.config().powershell_path, "powershell.exe");
        assert_eq!(host.config().timeout_seconds, 60);
    }

    #[tokio::test]
    async fn test_task_exists_via_get() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.reply(PsOutput::ok(
            r#"{"TaskPath":"\\","TaskName":"Disable Nvidia Telemetry","State":3,"Triggers":"MSFT_TaskLogonTrigger"}"#,
        ));
        let host = PowerShellHost::with_runner(HostConfig::default(), runner.clone());
        assert!(host.task_exists("\\Disable Nvidia Telemetry").await.unwrap());
        // The queue is empty now, so the next lookup sees no rows.
        assert!(!host.task_exists("\\Disable Nvidia Telemetry").await.unwrap());
    }

    #[tokio::test]
    async fn test_task_exists_propagates_other_errors() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.reply(PsOutput::failed("Access is denied"));
        let host = PowerShellHost::with_runner(HostConfig::default(), runner);
        let err = host.task_exists("\\x").await.unwrap_err();
        assert!(err.is_access_denied());
    }
}
