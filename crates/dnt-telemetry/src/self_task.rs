//! Lifecycle of the application's own recurring scheduled task.
//!
//! At most one such task exists. `create` registers with replace semantics so
//! a second `create` swaps the trigger in place instead of adding a task;
//! `remove` on an absent task is a no-op.

use crate::config::TelemetryConfig;
use crate::types::{SelfTaskHandle, SelfTaskTrigger};
use dnt_core::DntResult;
use dnt_winmgmt::{TaskAction, TaskDefinition, TaskScheduler, TaskTriggerSpec};
use log::{debug, info};
use std::sync::Arc;

#[derive(Clone)]
pub struct SelfTaskManager {
    tasks: Arc<dyn TaskScheduler>,
    config: Arc<TelemetryConfig>,
}

impl SelfTaskManager {
    pub fn new(tasks: Arc<dyn TaskScheduler>, config: Arc<TelemetryConfig>) -> Self {
        Self { tasks, config }
    }

    pub fn task_path(&self) -> String {
        self.config.self_task_path()
    }

    /// The registered task, or `None` when absent.
    pub async fn get_self_task(&self) -> DntResult<Option<SelfTaskHandle>> {
        let path = self.task_path();
        match self.tasks.get_task(&path).await {
            Ok(task) => {
                let trigger = task
                    .triggers
                    .iter()
                    .find_map(|class| TaskTriggerSpec::from_cim_class(class))
                    .map(|spec| SelfTaskTrigger::from_spec(&spec));
                Ok(Some(SelfTaskHandle {
                    path: task.full_path(),
                    trigger,
                    enabled: task.enabled,
                }))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Register the task with `trigger`, replacing an existing one.
    pub async fn create(&self, trigger: SelfTaskTrigger) -> DntResult<SelfTaskHandle> {
        let definition = self.definition(trigger);
        info!(
            "Registering background task '{}' ({})",
            definition.path, trigger
        );
        self.tasks.register_task(&definition).await?;
        Ok(SelfTaskHandle {
            path: definition.path,
            trigger: Some(trigger),
            enabled: true,
        })
    }

    /// Delete the task if present. Returns whether a task was removed.
    pub async fn remove(&self) -> DntResult<bool> {
        let path = self.task_path();
        match self.tasks.unregister_task(&path).await {
            Ok(()) => {
                info!("Removed background task '{}'", path);
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!("Background task '{}' already absent", path);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// The definition `create` registers.
    pub fn definition(&self, trigger: SelfTaskTrigger) -> TaskDefinition {
        let arguments = self.config.self_task_arguments.trim();
        TaskDefinition {
            path: self.task_path(),
            description: Some("Disables NVIDIA telemetry services and scheduled tasks.".to_string()),
            action: TaskAction {
                execute: self.config.resolve_executable(),
                arguments: (!arguments.is_empty()).then(|| arguments.to_string()),
                working_directory: None,
            },
            trigger: trigger.to_spec(self.config.daily_at),
            run_elevated: true,
        }
    }
}
