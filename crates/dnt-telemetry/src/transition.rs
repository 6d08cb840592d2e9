//! Applies a target state to a batch of artifacts.
//!
//! Artifacts are processed one at a time, in the order supplied. A failure
//! on one artifact is recorded in its [`TransitionResult`] and processing
//! continues with the next; nothing is rolled back.

use crate::types::{ArtifactKind, TargetState, TelemetryArtifact, TransitionRequest, TransitionResult};
use dnt_core::{DntError, DntResult, LogEntry, LogSink};
use dnt_winmgmt::{ServiceControl, ServiceStartMode, TaskScheduler};
use log::{debug, warn};
use std::sync::Arc;

#[derive(Clone)]
pub struct TransitionEngine {
    services: Arc<dyn ServiceControl>,
    tasks: Arc<dyn TaskScheduler>,
    sink: Arc<dyn LogSink>,
    enable_start_mode: ServiceStartMode,
}

impl TransitionEngine {
    pub fn new(
        services: Arc<dyn ServiceControl>,
        tasks: Arc<dyn TaskScheduler>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            services,
            tasks,
            sink,
            enable_start_mode: ServiceStartMode::Manual,
        }
    }

    /// Start mode used when enabling services. `Disabled` and `Unknown` are
    /// not valid re-enable modes and fall back to `Manual`.
    pub fn with_enable_start_mode(mut self, mode: ServiceStartMode) -> Self {
        self.enable_start_mode = match mode {
            ServiceStartMode::Disabled | ServiceStartMode::Unknown => {
                warn!("{:?} is not a valid enable start mode, using Manual", mode);
                ServiceStartMode::Manual
            }
            other => other,
        };
        self
    }

    pub fn enable_start_mode(&self) -> ServiceStartMode {
        self.enable_start_mode
    }

    /// Apply `request` to a batch of services.
    ///
    /// Fails as a whole only when the batch contains a non-service artifact.
    pub async fn apply_services(&self, request: &TransitionRequest) -> DntResult<Vec<TransitionResult>> {
        validate(request, ArtifactKind::Service)?;
        let mut results = Vec::with_capacity(request.artifacts.len());
        for artifact in &request.artifacts {
            let outcome = match request.target {
                TargetState::Disabled => {
                    self.disable_service(&artifact.id, request.stop_running_instance)
                        .await
                }
                TargetState::Enabled => self.enable_service(&artifact.id).await,
            };
            results.push(self.finish(artifact, request, outcome));
        }
        Ok(results)
    }

    /// Apply `request` to a batch of scheduled tasks.
    pub async fn apply_tasks(&self, request: &TransitionRequest) -> DntResult<Vec<TransitionResult>> {
        validate(request, ArtifactKind::ScheduledTask)?;
        let enabled = request.target == TargetState::Enabled;
        let action = format!("Failed to {} scheduled task", request.target.verb());
        let mut results = Vec::with_capacity(request.artifacts.len());
        for artifact in &request.artifacts {
            let outcome = self
                .tasks
                .set_task_enabled(&artifact.id, enabled)
                .await
                .map(|()| Action::Toggled)
                .map_err(|e| e.context(&artifact.id, &action));
            results.push(self.finish(artifact, request, outcome));
        }
        Ok(results)
    }

    async fn disable_service(&self, name: &str, stop_running: bool) -> DntResult<Action> {
        let mut stopped = false;
        let mut stop_error = None;
        if stop_running {
            match self.services.get_service(name).await {
                Ok(svc) if svc.is_running() => match self.services.stop_service(name).await {
                    Ok(()) => stopped = true,
                    Err(e) => stop_error = Some(e.context(name, "Failed to stop service")),
                },
                Ok(_) => {}
                Err(e) => stop_error = Some(e.context(name, "Failed to query service")),
            }
        }

        // A failed stop must not prevent the start mode change.
        if let Err(e) = self
            .services
            .set_start_mode(name, ServiceStartMode::Disabled)
            .await
        {
            let e = e.context(name, "Failed to disable service");
            return Err(match stop_error {
                Some(stop) => merge_failures(stop, e),
                None => e,
            });
        }

        match stop_error {
            Some(e) => Err(e),
            None if stopped => Ok(Action::StoppedAndToggled),
            None => Ok(Action::Toggled),
        }
    }

    async fn enable_service(&self, name: &str) -> DntResult<Action> {
        self.services
            .set_start_mode(name, self.enable_start_mode)
            .await
            .map(|()| Action::Toggled)
            .map_err(|e| e.context(name, "Failed to enable service"))
    }

    fn finish(
        &self,
        artifact: &TelemetryArtifact,
        request: &TransitionRequest,
        outcome: DntResult<Action>,
    ) -> TransitionResult {
        match outcome {
            Ok(action) => {
                debug!("{} {} '{}'", action.verb(request.target), artifact.kind, artifact.id);
                if request.emit_log {
                    self.sink.record(&LogEntry::info(format!(
                        "{} {} '{}'",
                        action.verb(request.target),
                        artifact.kind,
                        artifact.id
                    )));
                }
                TransitionResult::ok(artifact)
            }
            Err(e) => {
                warn!("Could not {} {} '{}': {}", request.target.verb(), artifact.kind, artifact.id, e);
                if request.emit_log {
                    self.sink.record(&LogEntry::error(failure_line(&e)));
                }
                TransitionResult::failed(artifact, e)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Toggled,
    StoppedAndToggled,
}

impl Action {
    fn verb(self, target: TargetState) -> &'static str {
        match (self, target) {
            (Self::StoppedAndToggled, _) => "Stopped and disabled",
            (Self::Toggled, TargetState::Disabled) => "Disabled",
            (Self::Toggled, TargetState::Enabled) => "Enabled",
        }
    }
}

/// Both steps of a service disable failed. The message keeps both in call
/// order; `AccessDenied` wins the kind so callers still see elevation is needed.
fn merge_failures(stop: DntError, disable: DntError) -> DntError {
    let kind = if disable.is_access_denied() && !stop.is_access_denied() {
        disable.kind
    } else {
        stop.kind
    };
    DntError {
        kind,
        message: format!("{}; {}", stop.message, disable.message),
        details: stop.details.or(disable.details),
    }
}

/// The error message already names the artifact and the attempted action.
fn failure_line(e: &DntError) -> String {
    if e.is_access_denied() {
        format!("{} (administrator rights required)", e.message)
    } else {
        e.message.clone()
    }
}

fn validate(request: &TransitionRequest, kind: ArtifactKind) -> DntResult<()> {
    match request.artifacts.iter().find(|a| a.kind != kind) {
        Some(a) => Err(DntError::invalid_input(format!(
            "{} '{}' passed to the {} transition",
            a.kind, a.id, kind
        ))),
        None => Ok(()),
    }
}
