//! Local Scheduled Task management.
//!
//! [`TaskScheduler`] is the OS task scheduler interface the telemetry engine
//! talks to. [`ScheduledTaskManager`] implements it with the ScheduledTasks
//! PowerShell module (`MSFT_ScheduledTask`).

use crate::powershell::{PsExecutor, PsScripts};
use crate::types::*;
use async_trait::async_trait;
use chrono::Timelike;
use dnt_core::{DntError, DntResult};
use log::info;
use serde::{Deserialize, Deserializer};

/// Enumerate, toggle, create and delete scheduled tasks.
///
/// Paths are full task paths (`\Folder\Name`). Implementations must report
/// a missing task as `NotFound`.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// List all scheduled tasks.
    async fn list_tasks(&self) -> DntResult<Vec<ScheduledTask>>;

    /// Get a task, including its trigger classes.
    async fn get_task(&self, path: &str) -> DntResult<ScheduledTask>;

    /// Set or clear the task's enabled flag.
    async fn set_task_enabled(&self, path: &str, enabled: bool) -> DntResult<()>;

    /// Register a task, replacing any task already registered at the same path.
    async fn register_task(&self, definition: &TaskDefinition) -> DntResult<()>;

    /// Unregister (delete) a task.
    async fn unregister_task(&self, path: &str) -> DntResult<()>;

    /// Whether a task exists at `path`.
    async fn task_exists(&self, path: &str) -> DntResult<bool> {
        match self.get_task(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// PowerShell sometimes unrolls one-element arrays into a bare value.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Row shape produced by the `Get-ScheduledTask` select below.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskRow {
    #[serde(default)]
    task_path: Option<String>,
    task_name: String,
    #[serde(default)]
    state: Option<u32>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    triggers: Vec<String>,
}

impl From<TaskRow> for ScheduledTask {
    fn from(row: TaskRow) -> Self {
        let state = row
            .state
            .map(ScheduledTaskState::from_value)
            .unwrap_or(ScheduledTaskState::Unknown);
        ScheduledTask {
            task_path: row.task_path.unwrap_or_else(|| "\\".to_string()),
            task_name: row.task_name,
            state,
            enabled: row.enabled.unwrap_or(state != ScheduledTaskState::Disabled),
            description: row.description,
            triggers: row.triggers,
        }
    }
}

/// Manages Windows Scheduled Tasks via PowerShell.
pub struct ScheduledTaskManager;

impl ScheduledTaskManager {
    const PROPS: &'static [&'static str] = &[
        "TaskPath",
        "TaskName",
        "Description",
        "@{n='State';e={[int]$_.State}}",
        "@{n='Enabled';e={$_.Settings.Enabled}}",
    ];

    const TRIGGER_PROP: &'static str =
        "@{n='Triggers';e={@($_.Triggers | ForEach-Object { $_.CimClass.CimClassName })}}";

    fn locate(path: &str) -> String {
        let (folder, name) = split_task_path(path);
        format!(
            "-TaskPath {} -TaskName {}",
            PsScripts::quote(&folder),
            PsScripts::quote(&name)
        )
    }

    // ─── Query ───────────────────────────────────────────────────────

    pub fn list_script() -> String {
        format!(
            "{} {} {}",
            PsScripts::ensure_array("Get-ScheduledTask"),
            PsScripts::select(Self::PROPS),
            PsScripts::to_json(2)
        )
    }

    pub fn get_script(path: &str) -> String {
        let mut props = Self::PROPS.to_vec();
        props.push(Self::TRIGGER_PROP);
        format!(
            "{} {} {}",
            PsScripts::ensure_array(&format!(
                "Get-ScheduledTask {}",
                Self::locate(path)
            )),
            PsScripts::select(&props),
            PsScripts::to_json(3)
        )
    }

    /// List all scheduled tasks.
    pub async fn list_tasks(ps: &PsExecutor) -> DntResult<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> = ps.run_json_array(&Self::list_script()).await?;
        Ok(rows.into_iter().map(ScheduledTask::from).collect())
    }

    /// Get a task by full path.
    pub async fn get_task(ps: &PsExecutor, path: &str) -> DntResult<ScheduledTask> {
        let rows: Vec<TaskRow> = ps.run_json_array(&Self::get_script(path)).await?;
        rows.into_iter()
            .next()
            .map(ScheduledTask::from)
            .ok_or_else(|| DntError::not_found(format!("scheduled task {}", path)))
    }

    // ─── Control ─────────────────────────────────────────────────────

    pub async fn set_enabled(ps: &PsExecutor, path: &str, enabled: bool) -> DntResult<()> {
        let verb = if enabled { "Enable" } else { "Disable" };
        info!("{} scheduled task '{}'", verb, path);
        ps.run_void(&format!(
            "{}-ScheduledTask {} | Out-Null",
            verb,
            Self::locate(path)
        ))
        .await
    }

    pub async fn unregister_task(ps: &PsExecutor, path: &str) -> DntResult<()> {
        info!("Unregistering scheduled task '{}'", path);
        ps.run_void(&format!(
            "Unregister-ScheduledTask {} -Confirm:$false",
            Self::locate(path)
        ))
        .await
    }

    // ─── Registration ────────────────────────────────────────────────

    fn trigger_script(trigger: &TaskTriggerSpec) -> String {
        match trigger {
            TaskTriggerSpec::AtLogon => "New-ScheduledTaskTrigger -AtLogOn".to_string(),
            TaskTriggerSpec::Daily { at } => format!(
                "New-ScheduledTaskTrigger -Daily -At '{:02}:{:02}'",
                at.hour(),
                at.minute()
            ),
            TaskTriggerSpec::Hourly => "New-ScheduledTaskTrigger -Once -At (Get-Date) -RepetitionInterval (New-TimeSpan -Hours 1)".to_string(),
            TaskTriggerSpec::OnIdle => "Get-CimClass -Namespace 'Root/Microsoft/Windows/TaskScheduler' -ClassName MSFT_TaskIdleTrigger | New-CimInstance -ClientOnly".to_string(),
        }
    }

    /// Build the registration script. `-Force` replaces an existing task in a
    /// single scheduler call, so readers never observe zero or two tasks.
    pub fn register_script(def: &TaskDefinition) -> String {
        let (folder, name) = split_task_path(&def.path);

        let mut action = format!(
            "New-ScheduledTaskAction -Execute {}",
            PsScripts::quote(&def.action.execute)
        );
        if let Some(ref args) = def.action.arguments {
            action.push_str(&format!(" -Argument {}", PsScripts::quote(args)));
        }
        if let Some(ref dir) = def.action.working_directory {
            action.push_str(&format!(" -WorkingDirectory {}", PsScripts::quote(dir)));
        }

        let settings = match def.trigger {
            TaskTriggerSpec::OnIdle => {
                "New-ScheduledTaskSettingsSet -AllowStartIfOnBatteries -DontStopIfGoingOnBatteries -RunOnlyIfIdle -StartWhenAvailable"
            }
            _ => "New-ScheduledTaskSettingsSet -AllowStartIfOnBatteries -DontStopIfGoingOnBatteries -StartWhenAvailable",
        };

        let mut script = format!(
            "$a = {}; $t = {}; $s = {}; ",
            action,
            Self::trigger_script(&def.trigger),
            settings
        );
        let mut register = format!(
            "Register-ScheduledTask -TaskPath {} -TaskName {} -Action $a -Trigger $t -Settings $s",
            PsScripts::quote(&folder),
            PsScripts::quote(&name)
        );
        if def.run_elevated {
            script.push_str(
                "$p = New-ScheduledTaskPrincipal -UserId 'SYSTEM' -LogonType ServiceAccount -RunLevel Highest; ",
            );
            register.push_str(" -Principal $p");
        }
        if let Some(ref desc) = def.description {
            register.push_str(&format!(" -Description {}", PsScripts::quote(desc)));
        }
        register.push_str(" -Force | Out-Null");
        script.push_str(&register);
        script
    }

    pub async fn register_task(ps: &PsExecutor, def: &TaskDefinition) -> DntResult<()> {
        info!(
            "Registering scheduled task '{}' ({})",
            def.path,
            def.trigger.cim_class()
        );
        ps.run_void(&Self::register_script(def)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::powershell::testing::ScriptedRunner;
    use crate::powershell::PsOutput;
    use chrono::NaiveTime;
    use std::sync::Arc;

    fn executor() -> (Arc<ScriptedRunner>, PsExecutor) {
        let runner = Arc::new(ScriptedRunner::default());
        (runner.clone(), PsExecutor::with_runner(runner))
    }

    fn definition(trigger: TaskTriggerSpec) -> TaskDefinition {
        TaskDefinition {
            path: "\\Disable Nvidia Telemetry".to_string(),
            description: Some("Keeps telemetry off".to_string()),
            action: TaskAction {
                execute: "C:\\Tools\\dnt.exe".to_string(),
                arguments: Some("silent".to_string()),
                working_directory: None,
            },
            trigger,
            run_elevated: true,
        }
    }

    #[test]
    fn test_row_to_task() {
        let row: TaskRow = serde_json::from_str(
            r#"{"TaskPath":"\\","TaskName":"NvTmMon_{B2FE1952}","State":3,"Enabled":true,"Description":null}"#,
        )
        .unwrap();
        let task = ScheduledTask::from(row);
        assert_eq!(task.full_path(), "\\NvTmMon_{B2FE1952}");
        assert_eq!(task.state, ScheduledTaskState::Ready);
        assert!(task.enabled);
        assert!(task.triggers.is_empty());
    }

    #[test]
    fn test_enabled_falls_back_to_state() {
        let row: TaskRow =
            serde_json::from_str(r#"{"TaskPath":"\\","TaskName":"x","State":1}"#).unwrap();
        assert!(!ScheduledTask::from(row).enabled);
    }

    #[test]
    fn test_triggers_one_or_many() {
        let row: TaskRow = serde_json::from_str(
            r#"{"TaskName":"x","Triggers":"MSFT_TaskLogonTrigger"}"#,
        )
        .unwrap();
        assert_eq!(row.triggers, vec!["MSFT_TaskLogonTrigger"]);

        let row: TaskRow = serde_json::from_str(
            r#"{"TaskName":"x","Triggers":["MSFT_TaskDailyTrigger","MSFT_TaskIdleTrigger"]}"#,
        )
        .unwrap();
        assert_eq!(row.triggers.len(), 2);

        let row: TaskRow = serde_json::from_str(r#"{"TaskName":"x","Triggers":null}"#).unwrap();
        assert!(row.triggers.is_empty());
    }

    #[test]
    fn test_register_script_replaces_and_elevates() {
        let script = ScheduledTaskManager::register_script(&definition(TaskTriggerSpec::AtLogon));
        assert!(script.contains("New-ScheduledTaskTrigger -AtLogOn"));
        assert!(script.contains("-TaskPath '\\' -TaskName 'Disable Nvidia Telemetry'"));
        assert!(script.contains("-Argument 'silent'"));
        assert!(script.contains("-Principal $p"));
        assert!(script.ends_with("-Force | Out-Null"));
    }

    #[test]
    fn test_register_script_triggers() {
        let daily = ScheduledTaskManager::register_script(&definition(TaskTriggerSpec::Daily {
            at: NaiveTime::from_hms_opt(3, 5, 0).unwrap(),
        }));
        assert!(daily.contains("-Daily -At '03:05'"));

        let hourly = ScheduledTaskManager::register_script(&definition(TaskTriggerSpec::Hourly));
        assert!(hourly.contains("New-TimeSpan -Hours 1"));

        let idle = ScheduledTaskManager::register_script(&definition(TaskTriggerSpec::OnIdle));
        assert!(idle.contains("MSFT_TaskIdleTrigger"));
        assert!(idle.contains("-RunOnlyIfIdle"));
    }

    #[tokio::test]
    async fn test_get_task_missing_is_not_found() {
        let (_runner, ps) = executor();
        let err = ScheduledTaskManager::get_task(&ps, "\\Nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_task_keeps_access_denied_apart_from_missing() {
        let (runner, ps) = executor();
        runner.reply(PsOutput::failed(
            "Get-ScheduledTask : No MSFT_ScheduledTask objects found with property 'TaskName' equal to 'Nope'.",
        ));
        runner.reply(PsOutput::failed("Get-ScheduledTask : Access is denied."));

        let err = ScheduledTaskManager::get_task(&ps, "\\Nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!runner.last_script().contains("SilentlyContinue"));

        let err = ScheduledTaskManager::get_task(&ps, "\\Disable Nvidia Telemetry")
            .await
            .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[tokio::test]
    async fn test_set_enabled_script() {
        let (runner, ps) = executor();
        ScheduledTaskManager::set_enabled(&ps, "\\NVIDIA\\NvTmRep", false)
            .await
            .unwrap();
        assert!(runner
            .last_script()
            .ends_with("Disable-ScheduledTask -TaskPath '\\NVIDIA\\' -TaskName 'NvTmRep' | Out-Null"));
    }

    #[tokio::test]
    async fn test_list_tasks_single_object() {
        let (runner, ps) = executor();
        runner.reply(PsOutput::ok(
            r#"{"TaskPath":"\\","TaskName":"NvTmRep_{B2FE1952}","State":1,"Enabled":false}"#,
        ));
        let tasks = ScheduledTaskManager::list_tasks(&ps).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].enabled);
    }
}
