//! Aggregate facade over matcher, inspector, transition engine and self-task
//! manager, sharing one configuration, OS backend and log sink.

use crate::config::TelemetryConfig;
use crate::inspector::StateInspector;
use crate::matcher::ArtifactMatcher;
use crate::self_task::SelfTaskManager;
use crate::transition::TransitionEngine;
use crate::types::*;
use dnt_core::{DntResult, LogEntry, LogSink};
use dnt_winmgmt::{ServiceControl, TaskScheduler};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a refresh: what was found and in which state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    pub services: Vec<TelemetryArtifact>,
    pub tasks: Vec<TelemetryArtifact>,
    pub services_state: LogicalState,
    pub tasks_state: LogicalState,
    pub self_task: Option<SelfTaskHandle>,
}

impl TelemetryReport {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.tasks.is_empty()
    }
}

/// Per-kind results of a combined services + tasks transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub services: Vec<TransitionResult>,
    pub tasks: Vec<TransitionResult>,
}

impl BatchSummary {
    pub fn results(&self) -> impl Iterator<Item = &TransitionResult> {
        self.services.iter().chain(self.tasks.iter())
    }

    pub fn failures(&self) -> Vec<&TransitionResult> {
        self.results().filter(|r| !r.succeeded).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results().all(|r| r.succeeded)
    }

    pub fn len(&self) -> usize {
        self.services.len() + self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Central telemetry management service.
#[derive(Clone)]
pub struct TelemetryService {
    config: Arc<TelemetryConfig>,
    matcher: ArtifactMatcher,
    inspector: StateInspector,
    engine: TransitionEngine,
    self_task: SelfTaskManager,
    sink: Arc<dyn LogSink>,
}

impl TelemetryService {
    pub fn new(
        config: TelemetryConfig,
        services: Arc<dyn ServiceControl>,
        tasks: Arc<dyn TaskScheduler>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let config = Arc::new(config);
        let signatures = Arc::new(config.signatures.clone());
        Self {
            matcher: ArtifactMatcher::new(signatures, services.clone(), tasks.clone()),
            inspector: StateInspector::new(services.clone(), tasks.clone()),
            engine: TransitionEngine::new(services, tasks.clone(), sink.clone())
                .with_enable_start_mode(config.enable_start_mode),
            self_task: SelfTaskManager::new(tasks, config.clone()),
            config,
            sink,
        }
    }

    /// Build from one backend implementing both OS interfaces.
    pub fn with_host<H>(config: TelemetryConfig, host: Arc<H>, sink: Arc<dyn LogSink>) -> Self
    where
        H: ServiceControl + TaskScheduler + 'static,
    {
        Self::new(config, host.clone(), host, sink)
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn self_tasks(&self) -> &SelfTaskManager {
        &self.self_task
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Discovery
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn find_services(&self, log: bool) -> Vec<TelemetryArtifact> {
        self.matcher.find_telemetry_services(self.log_to(log)).await
    }

    pub async fn find_tasks(&self, log: bool) -> Vec<TelemetryArtifact> {
        self.matcher.find_telemetry_tasks(self.log_to(log)).await
    }

    /// Discover artifacts and the self-task. A self-task lookup failure is
    /// logged and reported as absent.
    pub async fn refresh(&self, log: bool) -> TelemetryReport {
        let services = self.find_services(log).await;
        let tasks = self.find_tasks(log).await;
        let self_task = match self.self_task.get_self_task().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Could not query background task: {}", e);
                None
            }
        };
        TelemetryReport {
            services_state: LogicalState::aggregate(services.iter().map(|a| a.state)),
            tasks_state: LogicalState::aggregate(tasks.iter().map(|a| a.state)),
            services,
            tasks,
            self_task,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Transitions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn apply_services(&self, request: &TransitionRequest) -> DntResult<Vec<TransitionResult>> {
        self.engine.apply_services(request).await
    }

    pub async fn apply_tasks(&self, request: &TransitionRequest) -> DntResult<Vec<TransitionResult>> {
        self.engine.apply_tasks(request).await
    }

    /// Re-read every artifact a batch touched, in batch order, so the caller
    /// shows what the OS reports now rather than what was requested.
    pub async fn reinspect(&self, summary: &BatchSummary) -> Vec<TelemetryArtifact> {
        let touched: Vec<TelemetryArtifact> = summary
            .results()
            .map(|r| TelemetryArtifact {
                kind: r.kind,
                id: r.id.clone(),
                display_name: r.id.clone(),
                state: LogicalState::Unknown,
            })
            .collect();
        self.inspector.inspect_all(&touched).await
    }

    /// Discover everything and disable it, stopping running services.
    pub async fn disable_all(&self, log: bool) -> DntResult<BatchSummary> {
        self.transition_all(TargetState::Disabled, log).await
    }

    /// Discover everything and re-enable it.
    pub async fn enable_all(&self, log: bool) -> DntResult<BatchSummary> {
        self.transition_all(TargetState::Enabled, log).await
    }

    /// Unattended run launched by the background task.
    pub async fn run_silent(&self) -> DntResult<BatchSummary> {
        info!("Running in silent mode");
        let summary = self.disable_all(true).await?;
        let failed = summary.failures().len();
        let line = format!(
            "Silent run finished: {} artifact(s), {} failure(s)",
            summary.len(),
            failed
        );
        if failed == 0 {
            self.sink.record(&LogEntry::info(line).suppressed());
        } else {
            self.sink.record(&LogEntry::error(line).suppressed());
        }
        Ok(summary)
    }

    async fn transition_all(&self, target: TargetState, log: bool) -> DntResult<BatchSummary> {
        let services = self.find_services(log).await;
        let tasks = self.find_tasks(log).await;
        let stop = target == TargetState::Disabled;

        let services = self
            .engine
            .apply_services(
                &TransitionRequest::new(target, services)
                    .stop_running(stop)
                    .logged(log),
            )
            .await?;
        let tasks = self
            .engine
            .apply_tasks(&TransitionRequest::new(target, tasks).logged(log))
            .await?;
        Ok(BatchSummary { services, tasks })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Background task
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn get_self_task(&self) -> DntResult<Option<SelfTaskHandle>> {
        self.self_task.get_self_task().await
    }

    pub async fn create_self_task(&self, trigger: SelfTaskTrigger) -> DntResult<SelfTaskHandle> {
        self.self_task.create(trigger).await
    }

    pub async fn remove_self_task(&self) -> DntResult<bool> {
        self.self_task.remove().await
    }

    fn log_to(&self, log: bool) -> Option<&dyn LogSink> {
        log.then_some(self.sink.as_ref())
    }
}
