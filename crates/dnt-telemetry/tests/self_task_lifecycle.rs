use dnt_core::MemoryLogSink;
use dnt_telemetry::{SelfTaskTrigger, TelemetryConfig, TelemetryService};
use dnt_winmgmt::{MemoryHost, TaskScheduler};
use std::sync::Arc;

fn telemetry(host: &Arc<MemoryHost>) -> TelemetryService {
    let config = TelemetryConfig {
        self_task_executable: Some("C:\\Program Files\\dnt\\dnt.exe".to_string()),
        ..TelemetryConfig::default()
    };
    TelemetryService::with_host(config, host.clone(), Arc::new(MemoryLogSink::new()))
}

#[tokio::test]
async fn create_replace_remove() {
    let host = Arc::new(MemoryHost::new());
    let svc = telemetry(&host);

    assert!(svc.get_self_task().await.unwrap().is_none());

    svc.create_self_task(SelfTaskTrigger::Daily).await.unwrap();
    let handle = svc.get_self_task().await.unwrap().unwrap();
    assert_eq!(handle.trigger, Some(SelfTaskTrigger::Daily));
    assert_eq!(handle.path, "\\Disable Nvidia Telemetry");

    svc.create_self_task(SelfTaskTrigger::Hourly).await.unwrap();
    let handle = svc.get_self_task().await.unwrap().unwrap();
    assert_eq!(handle.trigger, Some(SelfTaskTrigger::Hourly));
    assert_eq!(host.task_count(), 1);

    assert!(svc.remove_self_task().await.unwrap());
    assert!(svc.get_self_task().await.unwrap().is_none());
    assert!(!svc.remove_self_task().await.unwrap());
}

#[tokio::test]
async fn replace_never_removes_first() {
    let host = Arc::new(MemoryHost::new());
    let svc = telemetry(&host);

    for trigger in SelfTaskTrigger::ALL {
        svc.create_self_task(trigger).await.unwrap();
        assert_eq!(
            svc.get_self_task().await.unwrap().and_then(|h| h.trigger),
            Some(trigger)
        );
    }
    // Replacement goes through register only, never through unregister.
    assert!(host
        .calls()
        .iter()
        .all(|c| !c.starts_with("unregister_task")));
    assert_eq!(host.registrations(), 4);
    assert!(host.task_exists("\\Disable Nvidia Telemetry").await.unwrap());
}

#[tokio::test]
async fn self_task_is_not_a_telemetry_artifact() {
    let host = Arc::new(MemoryHost::new());
    let svc = telemetry(&host);
    svc.create_self_task(SelfTaskTrigger::AtLogon).await.unwrap();

    let report = svc.refresh(false).await;
    assert!(report.tasks.is_empty());
    assert_eq!(
        report.self_task.and_then(|h| h.trigger),
        Some(SelfTaskTrigger::AtLogon)
    );
}
