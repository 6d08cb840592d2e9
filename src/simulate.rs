//! Sample machine for `--simulate` runs.

use dnt_winmgmt::{MemoryHost, ScheduledTask, ServiceStartMode, ServiceState, WindowsService};

const INSTALL_GUID: &str = "{B2FE1952-0186-46C3-BAEC-A80AA35AC5B8}";

/// A machine with a typical driver install: the telemetry container service,
/// the report/monitor/profile-updater tasks, and a few unrelated objects.
pub fn sample_host() -> MemoryHost {
    let host = MemoryHost::new()
        .with_service(WindowsService::new(
            "NvTelemetryContainer",
            "NVIDIA Telemetry Container",
            ServiceStartMode::Auto,
            ServiceState::Running,
        ))
        .with_service(WindowsService::new(
            "NVDisplay.ContainerLocalSystem",
            "NVIDIA Display Container LS",
            ServiceStartMode::Auto,
            ServiceState::Running,
        ))
        .with_service(WindowsService::new(
            "Spooler",
            "Print Spooler",
            ServiceStartMode::Auto,
            ServiceState::Running,
        ))
        .with_task(ScheduledTask::new(
            "\\Microsoft\\Windows\\Defrag\\ScheduledDefrag",
            true,
        ));
    for prefix in [
        "NvTmRep_",
        "NvTmRepOnLogon_",
        "NvTmMon_",
        "NvProfileUpdaterDaily_",
        "NvProfileUpdaterOnLogon_",
    ] {
        host.add_task(ScheduledTask::new(&format!("\\{}{}", prefix, INSTALL_GUID), true));
    }
    host
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnt_telemetry::{SignatureSet, matcher};
    use dnt_winmgmt::{ServiceControl, TaskScheduler};

    #[tokio::test]
    async fn test_sample_host_matches_default_signatures() {
        let host = sample_host();
        let set = SignatureSet::default();
        let services = matcher::match_services(&set, &host.list_services().await.unwrap());
        let tasks = matcher::match_tasks(&set, &host.list_tasks().await.unwrap());
        assert_eq!(services.len(), 1);
        assert_eq!(tasks.len(), 5);
    }
}
