//! Finds telemetry artifacts among all services and scheduled tasks.
//!
//! Every call enumerates the OS again; nothing is memoized between calls so
//! a vendor reinstall or OS update is picked up on the next refresh.

use crate::inspector::{service_state, task_state};
use crate::signature::SignatureSet;
use crate::types::{ArtifactKind, TelemetryArtifact};
use dnt_core::{LogEntry, LogSink};
use dnt_winmgmt::{ScheduledTask, ServiceControl, TaskScheduler, WindowsService};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Pure matching over an already enumerated service list.
pub fn match_services(signatures: &SignatureSet, services: &[WindowsService]) -> Vec<TelemetryArtifact> {
    let mut seen = HashSet::new();
    services
        .iter()
        .filter(|s| {
            signatures
                .first_match(ArtifactKind::Service, &s.name, &s.name)
                .is_some()
        })
        .filter(|s| seen.insert(s.name.to_ascii_lowercase()))
        .map(|s| TelemetryArtifact::service(&s.name, &s.display_name, service_state(s)))
        .collect()
}

/// Pure matching over an already enumerated task list.
pub fn match_tasks(signatures: &SignatureSet, tasks: &[ScheduledTask]) -> Vec<TelemetryArtifact> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .filter(|t| {
            signatures
                .first_match(ArtifactKind::ScheduledTask, &t.task_name, &t.full_path())
                .is_some()
        })
        .filter(|t| seen.insert(t.full_path().to_ascii_lowercase()))
        .map(|t| TelemetryArtifact::task(t.full_path(), task_state(t)))
        .collect()
}

/// Enumerates the OS and applies the signature table.
#[derive(Clone)]
pub struct ArtifactMatcher {
    signatures: Arc<SignatureSet>,
    services: Arc<dyn ServiceControl>,
    tasks: Arc<dyn TaskScheduler>,
}

impl ArtifactMatcher {
    pub fn new(
        signatures: Arc<SignatureSet>,
        services: Arc<dyn ServiceControl>,
        tasks: Arc<dyn TaskScheduler>,
    ) -> Self {
        Self {
            signatures,
            services,
            tasks,
        }
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    /// Matching services with their current state. An enumeration failure is
    /// logged and yields no matches.
    pub async fn find_telemetry_services(&self, sink: Option<&dyn LogSink>) -> Vec<TelemetryArtifact> {
        let services = match self.services.list_services().await {
            Ok(s) => s,
            Err(e) => {
                warn!("Service enumeration failed: {}", e);
                if let Some(sink) = sink {
                    sink.record(&LogEntry::error(format!("Failed to enumerate services: {}", e)));
                }
                return Vec::new();
            }
        };
        let found = match_services(&self.signatures, &services);
        debug!("{} of {} services matched", found.len(), services.len());
        if let Some(sink) = sink {
            report(sink, &found);
        }
        found
    }

    /// Matching scheduled tasks with their current state.
    pub async fn find_telemetry_tasks(&self, sink: Option<&dyn LogSink>) -> Vec<TelemetryArtifact> {
        let tasks = match self.tasks.list_tasks().await {
            Ok(t) => t,
            Err(e) => {
                warn!("Scheduled task enumeration failed: {}", e);
                if let Some(sink) = sink {
                    sink.record(&LogEntry::error(format!("Failed to enumerate scheduled tasks: {}", e)));
                }
                return Vec::new();
            }
        };
        let found = match_tasks(&self.signatures, &tasks);
        debug!("{} of {} scheduled tasks matched", found.len(), tasks.len());
        if let Some(sink) = sink {
            report(sink, &found);
        }
        found
    }
}

fn report(sink: &dyn LogSink, found: &[TelemetryArtifact]) {
    for artifact in found {
        sink.record(&LogEntry::info(format!(
            "Found telemetry {}: {} ({})",
            artifact.kind, artifact.id, artifact.state
        )));
    }
}
