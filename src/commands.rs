//! Command handlers.
//!
//! Handlers write user-facing output to a caller-supplied writer and return
//! an [`Outcome`]; the binary maps that to the process exit code.

use crate::cli::{Command, DisableArgs, SettingsCommand, TaskCommand};
use anyhow::Context as _;
use dnt_core::{FanoutLogSink, LogSink, MemoryLogSink, Settings, SettingsStore, TracingLogSink};
use dnt_telemetry::{
    BatchSummary, CheckState, LogicalState, SelectionState, SelfTaskHandle, SelfTaskTrigger, TelemetryArtifact,
    TelemetryConfig, TelemetryReport, TelemetryService, TransitionRequest,
};
use dnt_winmgmt::{ServiceControl, TaskScheduler};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Whether every artifact action succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    PartialFailure,
}

/// Everything a handler needs.
pub struct Context {
    pub telemetry: TelemetryService,
    /// Event view: action records of the current invocation.
    pub events: Arc<MemoryLogSink>,
    pub settings: SettingsStore,
}

impl Context {
    pub fn new<H>(config: TelemetryConfig, host: Arc<H>, settings: SettingsStore) -> Self
    where
        H: ServiceControl + TaskScheduler + 'static,
    {
        let events = Arc::new(MemoryLogSink::new());
        let sink: Arc<dyn LogSink> = Arc::new(
            FanoutLogSink::new()
                .with(events.clone())
                .with(Arc::new(TracingLogSink)),
        );
        Self {
            telemetry: TelemetryService::with_host(config, host, sink),
            events,
            settings,
        }
    }
}

pub async fn execute(ctx: &Context, command: &Command, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    match command {
        Command::Status { json } => status(ctx, *json, out).await,
        Command::Disable(args) => disable(ctx, args, out).await,
        Command::Enable { quiet } => enable(ctx, *quiet, out).await,
        Command::Silent => silent(ctx).await,
        Command::Task { action } => task(ctx, action, out).await,
        Command::Settings { action } => settings(ctx, action, out),
    }
}

// ─── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView<'a> {
    #[serde(flatten)]
    report: &'a TelemetryReport,
    services_selection: CheckState,
    tasks_selection: CheckState,
    can_disable: bool,
}

async fn status(ctx: &Context, json: bool, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    let report = ctx.telemetry.refresh(false).await;
    let services = SelectionState::from_artifacts(&report.services);
    let tasks = SelectionState::from_artifacts(&report.tasks);

    if json {
        let view = StatusView {
            report: &report,
            services_selection: services.aggregate(),
            tasks_selection: tasks.aggregate(),
            can_disable: !report.is_empty(),
        };
        serde_json::to_writer_pretty(&mut *out, &view)?;
        writeln!(out)?;
        return Ok(Outcome::Success);
    }

    write_group(out, "Telemetry Services", &report.services, report.services_state)?;
    write_group(out, "Telemetry Tasks", &report.tasks, report.tasks_state)?;
    write_self_task(out, report.self_task.as_ref())?;
    Ok(Outcome::Success)
}

fn write_group(
    out: &mut dyn Write,
    title: &str,
    artifacts: &[TelemetryArtifact],
    state: LogicalState,
) -> std::io::Result<()> {
    if artifacts.is_empty() {
        return writeln!(out, "{}: none found", title);
    }
    writeln!(out, "{} ({}):", title, state)?;
    for a in artifacts {
        let mark = match a.state {
            LogicalState::Disabled => 'x',
            LogicalState::Enabled => ' ',
            _ => '?',
        };
        writeln!(out, "  [{}] {}  {}", mark, a.label(), a.state)?;
    }
    Ok(())
}

fn write_self_task(out: &mut dyn Write, handle: Option<&SelfTaskHandle>) -> std::io::Result<()> {
    match handle {
        Some(h) => {
            let trigger = h
                .trigger
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unrecognised trigger".to_string());
            let enabled = if h.enabled { "" } else { ", disabled" };
            writeln!(out, "Background task: {} ({}{})", h.path, trigger, enabled)
        }
        None => writeln!(out, "Background task: not installed"),
    }
}

// ─── Transitions ─────────────────────────────────────────────────────

async fn disable(ctx: &Context, args: &DisableArgs, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    let report = ctx.telemetry.refresh(true).await;
    let mut services = SelectionState::from_artifacts(&report.services);
    let mut tasks = SelectionState::from_artifacts(&report.tasks);
    services.set_all(!args.tasks_only);
    tasks.set_all(!args.services_only);

    if !SelectionState::commit_enabled(&services, &tasks) {
        writeln!(out, "No telemetry artifacts to disable.")?;
        return Ok(Outcome::Success);
    }

    let mut summary = BatchSummary::default();
    if services.aggregate() == CheckState::Checked {
        summary.services = ctx
            .telemetry
            .apply_services(
                &TransitionRequest::disable(services.checked())
                    .stop_running(!args.no_stop)
                    .logged(true),
            )
            .await?;
    }
    if tasks.aggregate() == CheckState::Checked {
        summary.tasks = ctx
            .telemetry
            .apply_tasks(&TransitionRequest::disable(tasks.checked()).logged(true))
            .await?;
    }
    finish(ctx, &summary, args.quiet, out).await
}

async fn enable(ctx: &Context, quiet: bool, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    let summary = ctx.telemetry.enable_all(true).await?;
    finish(ctx, &summary, quiet, out).await
}

async fn silent(ctx: &Context) -> anyhow::Result<Outcome> {
    let summary = ctx.telemetry.run_silent().await?;
    Ok(outcome_of(&summary))
}

async fn finish(ctx: &Context, summary: &BatchSummary, quiet: bool, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    if !quiet {
        for entry in ctx.events.notifications() {
            writeln!(out, "{}", entry.display_line())?;
        }
        for artifact in ctx.telemetry.reinspect(summary).await {
            writeln!(out, "  {} '{}' is {}", artifact.kind, artifact.id, artifact.state)?;
        }
    }
    let failures = summary.failures();
    writeln!(
        out,
        "{} of {} artifact(s) updated.",
        summary.len() - failures.len(),
        summary.len()
    )?;
    if failures
        .iter()
        .any(|r| r.error.as_ref().is_some_and(|e| e.is_access_denied()))
    {
        writeln!(out, "Some changes were refused. Run dnt from an elevated prompt.")?;
    }
    Ok(outcome_of(summary))
}

fn outcome_of(summary: &BatchSummary) -> Outcome {
    if summary.all_succeeded() {
        Outcome::Success
    } else {
        Outcome::PartialFailure
    }
}

// ─── Background task ─────────────────────────────────────────────────

async fn task(ctx: &Context, action: &TaskCommand, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    match action {
        TaskCommand::Status => {
            let handle = ctx.telemetry.get_self_task().await?;
            write_self_task(out, handle.as_ref())?;
        }
        TaskCommand::Create { trigger } => {
            let trigger = match trigger {
                Some(t) => {
                    let t = SelfTaskTrigger::from(*t);
                    ctx.settings
                        .update(|s| s.background_task_trigger = t.to_index())
                        .context("Failed to persist trigger selection")?;
                    t
                }
                None => SelfTaskTrigger::from_index(ctx.settings.load()?.background_task_trigger),
            };
            let handle = ctx.telemetry.create_self_task(trigger).await?;
            info!("Background task installed with trigger {}", trigger);
            write_self_task(out, Some(&handle))?;
        }
        TaskCommand::Remove => {
            if ctx.telemetry.remove_self_task().await? {
                writeln!(out, "Background task removed.")?;
            } else {
                writeln!(out, "Background task was not installed.")?;
            }
        }
    }
    Ok(Outcome::Success)
}

// ─── Settings ────────────────────────────────────────────────────────

fn settings(ctx: &Context, action: &SettingsCommand, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    let current = match action {
        SettingsCommand::Show => ctx.settings.load()?,
        SettingsCommand::Set {
            file_logging,
            startup_update_check,
            trigger,
        } => ctx.settings.update(|s| apply_settings(s, *file_logging, *startup_update_check, trigger.map(Into::into)))?,
    };
    writeln!(out, "# {}", ctx.settings.path().display())?;
    serde_json::to_writer_pretty(&mut *out, &current)?;
    writeln!(out)?;
    if current.startup_update_check {
        warn!("Update checks are not performed by this build");
    }
    Ok(Outcome::Success)
}

fn apply_settings(
    settings: &mut Settings,
    file_logging: Option<bool>,
    startup_update_check: Option<bool>,
    trigger: Option<SelfTaskTrigger>,
) {
    if let Some(v) = file_logging {
        settings.file_logging = v;
    }
    if let Some(v) = startup_update_check {
        settings.startup_update_check = v;
    }
    if let Some(t) = trigger {
        settings.background_task_trigger = t.to_index();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_settings_only_touches_given_keys() {
        let mut s = Settings::default();
        apply_settings(&mut s, Some(true), None, Some(SelfTaskTrigger::Hourly));
        assert!(s.file_logging);
        assert!(!s.startup_update_check);
        assert_eq!(s.background_task_trigger, 2);
    }

    #[test]
    fn test_self_task_line() {
        let mut buf = Vec::new();
        write_self_task(&mut buf, None).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Background task: not installed\n");

        let mut buf = Vec::new();
        let handle = SelfTaskHandle {
            path: "\\Disable Nvidia Telemetry".to_string(),
            trigger: Some(SelfTaskTrigger::Daily),
            enabled: true,
        };
        write_self_task(&mut buf, Some(&handle)).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Background task: \\Disable Nvidia Telemetry (daily)\n"
        );
    }
}
