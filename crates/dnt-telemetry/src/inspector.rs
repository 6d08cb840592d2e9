//! Derives the logical state of an artifact from OS attributes.
//!
//! A service is disabled only when its start mode is `Disabled`; a stopped
//! service that can still start is enabled. A task is disabled when its
//! enabled flag is cleared.

use crate::types::{ArtifactKind, LogicalState, TelemetryArtifact};
use dnt_winmgmt::{ScheduledTask, ServiceControl, ServiceStartMode, TaskScheduler, WindowsService};
use log::warn;
use std::sync::Arc;

pub fn service_state(service: &WindowsService) -> LogicalState {
    match service.start_mode {
        ServiceStartMode::Disabled => LogicalState::Disabled,
        ServiceStartMode::Unknown => LogicalState::Unknown,
        _ => LogicalState::Enabled,
    }
}

pub fn task_state(task: &ScheduledTask) -> LogicalState {
    if task.enabled {
        LogicalState::Enabled
    } else {
        LogicalState::Disabled
    }
}

/// Re-reads artifacts from the OS.
#[derive(Clone)]
pub struct StateInspector {
    services: Arc<dyn ServiceControl>,
    tasks: Arc<dyn TaskScheduler>,
}

impl StateInspector {
    pub fn new(services: Arc<dyn ServiceControl>, tasks: Arc<dyn TaskScheduler>) -> Self {
        Self { services, tasks }
    }

    /// Current state of one artifact. Read failures yield `Unknown`.
    pub async fn inspect(&self, artifact: &TelemetryArtifact) -> LogicalState {
        let read = match artifact.kind {
            ArtifactKind::Service => self
                .services
                .get_service(&artifact.id)
                .await
                .map(|s| service_state(&s)),
            ArtifactKind::ScheduledTask => self
                .tasks
                .get_task(&artifact.id)
                .await
                .map(|t| task_state(&t)),
        };
        read.unwrap_or_else(|e| {
            warn!("Could not read {} '{}': {}", artifact.kind, artifact.id, e);
            LogicalState::Unknown
        })
    }

    /// Inspect each artifact in order and return them with refreshed state.
    pub async fn inspect_all(&self, artifacts: &[TelemetryArtifact]) -> Vec<TelemetryArtifact> {
        let mut out = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let mut refreshed = artifact.clone();
            refreshed.state = self.inspect(artifact).await;
            out.push(refreshed);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnt_core::DntErrorKind;
    use dnt_winmgmt::{MemoryHost, ServiceState};

    fn svc(mode: ServiceStartMode, state: ServiceState) -> WindowsService {
        WindowsService::new("NvTelemetryContainer", "NVIDIA Telemetry Container", mode, state)
    }

    #[test]
    fn test_service_state_ignores_run_state() {
        assert_eq!(
            service_state(&svc(ServiceStartMode::Auto, ServiceState::Stopped)),
            LogicalState::Enabled
        );
        assert_eq!(
            service_state(&svc(ServiceStartMode::Manual, ServiceState::Running)),
            LogicalState::Enabled
        );
        assert_eq!(
            service_state(&svc(ServiceStartMode::Disabled, ServiceState::Running)),
            LogicalState::Disabled
        );
        assert_eq!(
            service_state(&svc(ServiceStartMode::Unknown, ServiceState::Running)),
            LogicalState::Unknown
        );
    }

    #[test]
    fn test_task_state() {
        assert_eq!(task_state(&ScheduledTask::new("\\NvTmMon", true)), LogicalState::Enabled);
        assert_eq!(task_state(&ScheduledTask::new("\\NvTmMon", false)), LogicalState::Disabled);
    }

    #[tokio::test]
    async fn test_unreadable_artifact_is_unknown() {
        let host = Arc::new(
            MemoryHost::new()
                .with_service(svc(ServiceStartMode::Disabled, ServiceState::Stopped))
                .with_task(ScheduledTask::new("\\NvTmRep_{1}", true))
                .with_task(ScheduledTask::new("\\NvTmMon_{1}", true)),
        );
        host.fail("\\NvTmRep_{1}", DntErrorKind::AccessDenied);
        let inspector = StateInspector::new(host.clone(), host.clone());

        let artifacts = vec![
            TelemetryArtifact::service("NvTelemetryContainer", "", LogicalState::Unknown),
            TelemetryArtifact::task("\\NvTmRep_{1}", LogicalState::Enabled),
            TelemetryArtifact::task("\\NvTmMon_{1}", LogicalState::Unknown),
            TelemetryArtifact::task("\\Gone", LogicalState::Enabled),
        ];
        let states: Vec<_> = inspector
            .inspect_all(&artifacts)
            .await
            .into_iter()
            .map(|a| a.state)
            .collect();
        assert_eq!(
            states,
            vec![
                LogicalState::Disabled,
                LogicalState::Unknown,
                LogicalState::Enabled,
                LogicalState::Unknown,
            ]
        );
    }
}
