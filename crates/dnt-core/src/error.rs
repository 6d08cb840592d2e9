//! Error types shared by every crate in the workspace.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kinds for service, task and settings operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DntErrorKind {
    /// The service or task does not exist (or vanished since discovery).
    NotFound,
    /// Insufficient privileges; the caller may prompt for elevation.
    AccessDenied,
    /// Any other failure reported by the platform layer.
    OsApiFailure,
    /// The PowerShell process could not be spawned or exited non-zero.
    PowerShellError,
    /// JSON parsing / deserialization error.
    ParseError,
    /// A platform call did not complete in time.
    Timeout,
    /// The caller supplied an invalid argument.
    InvalidInput,
    /// The persisted settings could not be read or written.
    Settings,
    /// Local file-system error.
    Io,
}

/// Workspace-wide error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("[{kind:?}] {message}{}", .details.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
pub struct DntError {
    pub kind: DntErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl DntError {
    pub fn new(kind: DntErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        kind: DntErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(DntErrorKind::NotFound, format!("'{}' not found", what.into()))
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(DntErrorKind::AccessDenied, message)
    }

    pub fn os_failure(message: impl Into<String>) -> Self {
        Self::new(DntErrorKind::OsApiFailure, message)
    }

    pub fn ps_error(stderr: impl Into<String>) -> Self {
        Self::new(DntErrorKind::PowerShellError, stderr)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(DntErrorKind::ParseError, message)
    }

    pub fn timeout(op: &str) -> Self {
        Self::new(DntErrorKind::Timeout, format!("Operation '{}' timed out", op))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(DntErrorKind::InvalidInput, message)
    }

    pub fn settings(message: impl Into<String>) -> Self {
        Self::new(DntErrorKind::Settings, message)
    }

    /// Prefix the message with the object and action it concerns, keeping the kind.
    pub fn context(mut self, target: &str, action: &str) -> Self {
        self.message = format!("{} '{}': {}", action, target, self.message);
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == DntErrorKind::NotFound
    }

    pub fn is_access_denied(&self) -> bool {
        self.kind == DntErrorKind::AccessDenied
    }

    /// Everything that is neither `NotFound` nor `AccessDenied` is an OS API failure.
    pub fn is_os_failure(&self) -> bool {
        !self.is_not_found() && !self.is_access_denied()
    }

    /// Classify a raw platform error message into the taxonomy.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if ACCESS_DENIED_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::access_denied(message);
        }
        if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::new(DntErrorKind::NotFound, message);
        }
        Self::ps_error(message)
    }
}

const ACCESS_DENIED_MARKERS: &[&str] = &[
    "access is denied",
    "accessdenied",
    "permissiondenied",
    "0x80070005",
];

const NOT_FOUND_MARKERS: &[&str] = &[
    "cannot find any service",
    "noservicefoundforgivenname",
    "cannot find the file specified",
    "no msft_scheduledtask objects found",
    "objectnotfound",
];

impl From<std::io::Error> for DntError {
    fn from(e: std::io::Error) -> Self {
        Self::new(DntErrorKind::Io, e.to_string())
    }
}

/// Convert a `DntError` into a plain `String` for command returns.
impl From<DntError> for String {
    fn from(e: DntError) -> String {
        e.to_string()
    }
}

/// Convenience alias.
pub type DntResult<T> = Result<T, DntError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_access_denied() {
        let e = DntError::classify("Set-Service : Service 'x' cannot be configured. Access is denied");
        assert_eq!(e.kind, DntErrorKind::AccessDenied);
        assert!(e.is_access_denied());
        assert!(!e.is_os_failure());
    }

    #[test]
    fn test_classify_not_found() {
        let e = DntError::classify(
            "Get-Service : Cannot find any service with service name 'NvTelemetryContainer'.",
        );
        assert!(e.is_not_found());

        let e = DntError::classify("Get-ScheduledTask : No MSFT_ScheduledTask objects found with property 'TaskName' equal to 'x'");
        assert!(e.is_not_found());
    }

    #[test]
    fn test_classify_other() {
        let e = DntError::classify("The RPC server is unavailable");
        assert_eq!(e.kind, DntErrorKind::PowerShellError);
        assert!(e.is_os_failure());
    }

    #[test]
    fn test_display_with_details() {
        let e = DntError::with_details(DntErrorKind::ParseError, "bad json", "line 1");
        assert_eq!(e.to_string(), "[ParseError] bad json (line 1)");
        let e = DntError::not_found("NvTelemetryContainer");
        assert_eq!(e.to_string(), "[NotFound] 'NvTelemetryContainer' not found");
    }

    #[test]
    fn test_context_keeps_kind() {
        let e = DntError::access_denied("denied").context("NvTelemetryContainer", "Disable service");
        assert!(e.is_access_denied());
        assert_eq!(e.message, "Disable service 'NvTelemetryContainer': denied");
    }
}
