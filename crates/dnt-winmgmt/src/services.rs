//! Local Windows Service management.
//!
//! [`ServiceControl`] is the OS service interface the telemetry engine talks
//! to. [`ServiceManager`] implements its operations with `Win32_Service`
//! queries and the `*-Service` cmdlets.

use crate::powershell::{PsExecutor, PsScripts};
use crate::types::*;
use async_trait::async_trait;
use dnt_core::{DntError, DntResult};
use log::info;
use serde::Deserialize;

/// Enumerate and control OS services.
///
/// Implementations must report a missing service as `NotFound` and
/// insufficient privileges as `AccessDenied`.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// List all services on the host.
    async fn list_services(&self) -> DntResult<Vec<WindowsService>>;

    /// Get a single service by name.
    async fn get_service(&self, name: &str) -> DntResult<WindowsService>;

    /// Change service startup type.
    async fn set_start_mode(&self, name: &str, mode: ServiceStartMode) -> DntResult<()>;

    /// Stop a service.
    async fn stop_service(&self, name: &str) -> DntResult<()>;

    /// Start a service.
    async fn start_service(&self, name: &str) -> DntResult<()>;
}

/// Row shape produced by the `Win32_Service` select below.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRow {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    start_mode: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl From<ServiceRow> for WindowsService {
    fn from(row: ServiceRow) -> Self {
        WindowsService {
            display_name: row.display_name.unwrap_or_else(|| row.name.clone()),
            name: row.name,
            state: ServiceState::from_wmi(row.state.as_deref().unwrap_or("Unknown")),
            start_mode: ServiceStartMode::from_wmi(row.start_mode.as_deref().unwrap_or("Unknown")),
        }
    }
}

/// Manages Windows services via PowerShell.
pub struct ServiceManager;

impl ServiceManager {
    const PROPS: &'static [&'static str] = &["Name", "DisplayName", "StartMode", "State"];

    // ─── Query ───────────────────────────────────────────────────────

    pub fn list_script() -> String {
        format!(
            "{} {} {}",
            PsScripts::ensure_array("Get-CimInstance -ClassName Win32_Service"),
            PsScripts::select(Self::PROPS),
            PsScripts::to_json(2)
        )
    }

    pub fn get_script(name: &str) -> String {
        format!(
            "{} {} {}",
            PsScripts::ensure_array(&format!(
                "Get-CimInstance -ClassName Win32_Service | Where-Object {{ $_.Name -eq {} }}",
                PsScripts::quote(name)
            )),
            PsScripts::select(Self::PROPS),
            PsScripts::to_json(2)
        )
    }

    /// List all services on the host.
    pub async fn list_services(ps: &PsExecutor) -> DntResult<Vec<WindowsService>> {
        let rows: Vec<ServiceRow> = ps.run_json_array(&Self::list_script()).await?;
        Ok(rows.into_iter().map(WindowsService::from).collect())
    }

    /// Get a single service by name.
    pub async fn get_service(ps: &PsExecutor, name: &str) -> DntResult<WindowsService> {
        let rows: Vec<ServiceRow> = ps.run_json_array(&Self::get_script(name)).await?;
        rows.into_iter()
            .next()
            .map(WindowsService::from)
            .ok_or_else(|| DntError::not_found(format!("service {}", name)))
    }

    // ─── Control ─────────────────────────────────────────────────────

    pub async fn set_start_mode(
        ps: &PsExecutor,
        name: &str,
        mode: ServiceStartMode,
    ) -> DntResult<()> {
        info!("Setting service '{}' start mode to {:?}", name, mode);
        ps.run_void(&format!(
            "Set-Service -Name {} -StartupType {}",
            PsScripts::quote(name),
            mode.to_startup_type()
        ))
        .await
    }

    pub async fn stop_service(ps: &PsExecutor, name: &str) -> DntResult<()> {
        info!("Stopping service '{}'", name);
        ps.run_void(&format!("Stop-Service -Name {} -Force", PsScripts::quote(name)))
            .await
    }

    pub async fn start_service(ps: &PsExecutor, name: &str) -> DntResult<()> {
        info!("Starting service '{}'", name);
        ps.run_void(&format!("Start-Service -Name {}", PsScripts::quote(name)))
            .await
    }
}
