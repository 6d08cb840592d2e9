//! PowerShell execution engine for service and task cmdlets.
//!
//! Wraps `tokio::process::Command` to invoke PowerShell and parse the
//! `ConvertTo-Json` output. The process launch sits behind [`ScriptRunner`]
//! so the cmdlet layer can be exercised without a Windows host.

use crate::types::HostConfig;
use async_trait::async_trait;
use dnt_core::{DntError, DntErrorKind, DntResult};
use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Result of a PowerShell invocation.
#[derive(Debug, Clone, Default)]
pub struct PsOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl PsOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: 1,
        }
    }

    /// Whether the command completed successfully.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Parse stdout, but if it is empty or null return an empty Vec.
    pub fn parse_json_array<T: DeserializeOwned>(&self) -> DntResult<Vec<T>> {
        let trimmed = self.stdout.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Vec::new());
        }
        // ConvertTo-Json returns a bare object when N=1, array when N>1
        if trimmed.starts_with('[') {
            serde_json::from_str(trimmed).map_err(|e| Self::parse_error("JSON array", e, trimmed))
        } else {
            let item: T = serde_json::from_str(trimmed)
                .map_err(|e| Self::parse_error("JSON object", e, trimmed))?;
            Ok(vec![item])
        }
    }

    fn parse_error(what: &str, e: serde_json::Error, raw: &str) -> DntError {
        DntError::with_details(
            DntErrorKind::ParseError,
            format!("Failed to parse {}: {}", what, e),
            raw.chars().take(500).collect::<String>(),
        )
    }
}

// ─── Runner ──────────────────────────────────────────────────────────

/// Runs one PowerShell script and returns its raw output.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str) -> DntResult<PsOutput>;
}

/// Launches a real `powershell.exe` process per script.
pub struct ProcessRunner {
    config: HostConfig,
}

impl ProcessRunner {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    async fn run(&self, script: &str) -> DntResult<PsOutput> {
        let timeout = Duration::from_secs(self.config.timeout_seconds.max(10));

        let child = Command::new(&self.config.powershell_path)
            .args([
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-Command",
                script,
            ])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DntError::with_details(
                    DntErrorKind::PowerShellError,
                    "Failed to spawn PowerShell process",
                    e.to_string(),
                )
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| DntError::timeout("PowerShell command"))?
            .map_err(|e| {
                DntError::with_details(
                    DntErrorKind::PowerShellError,
                    "PowerShell process failed",
                    e.to_string(),
                )
            })?;

        Ok(PsOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

// ─── Executor ────────────────────────────────────────────────────────

/// Wraps scripts with strict error handling and interprets the output.
#[derive(Clone)]
pub struct PsExecutor {
    runner: Arc<dyn ScriptRunner>,
}

impl PsExecutor {
    pub fn new(config: &HostConfig) -> Self {
        Self::with_runner(Arc::new(ProcessRunner::new(config)))
    }

    pub fn with_runner(runner: Arc<dyn ScriptRunner>) -> Self {
        Self { runner }
    }

    fn wrap_script(body: &str) -> String {
        format!("$ErrorActionPreference = 'Stop'; {}", body)
    }

    /// Execute a script and return raw output.
    pub async fn run(&self, script: &str) -> DntResult<PsOutput> {
        let full_script = Self::wrap_script(script);
        debug!(
            "PS exec ({} chars): {}",
            full_script.len(),
            full_script.chars().take(200).collect::<String>()
        );

        let output = self.runner.run(&full_script).await?;

        trace!("PS stdout ({} bytes)", output.stdout.len());
        if !output.stderr.is_empty() {
            warn!(
                "PS stderr: {}",
                output.stderr.chars().take(500).collect::<String>()
            );
        }
        Ok(output)
    }

    /// Execute and assert success, classifying failures into the error taxonomy.
    pub async fn run_ok(&self, script: &str) -> DntResult<PsOutput> {
        let output = self.run(script).await?;
        if !output.success() {
            let msg = if output.stderr.trim().is_empty() {
                format!("PowerShell exited with code {}", output.exit_code)
            } else {
                output.stderr.trim().to_string()
            };
            return Err(DntError::classify(msg));
        }
        Ok(output)
    }

    /// Execute and parse the JSON output as a typed array.
    pub async fn run_json_array<T: DeserializeOwned>(&self, script: &str) -> DntResult<Vec<T>> {
        let output = self.run_ok(script).await?;
        output.parse_json_array()
    }

    /// Run a script that produces no output; just assert success.
    pub async fn run_void(&self, script: &str) -> DntResult<()> {
        self.run_ok(script).await?;
        Ok(())
    }
}

// ─── Script Builders ─────────────────────────────────────────────────

/// Utility functions that build common PowerShell script fragments.
pub struct PsScripts;

impl PsScripts {
    /// Escape a string value for embedding inside single-quoted PS strings.
    pub fn escape(s: &str) -> String {
        s.replace('\'', "''")
    }

    /// Single-quoted PS literal.
    pub fn quote(s: &str) -> String {
        format!("'{}'", Self::escape(s))
    }

    /// Build a ConvertTo-Json suffix with appropriate depth.
    pub fn to_json(depth: u32) -> String {
        format!("| ConvertTo-Json -Depth {} -Compress", depth)
    }

    /// Build a Select-Object clause from a slice of property expressions.
    pub fn select(props: &[&str]) -> String {
        if props.is_empty() {
            String::new()
        } else {
            format!("| Select-Object {}", props.join(", "))
        }
    }

    /// Wrap value in @() to ensure array output from PS.
    pub fn ensure_array(expr: &str) -> String {
        format!("@({})", expr)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every script and replies with queued outputs (success/empty when exhausted).
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub scripts: Mutex<Vec<String>>,
        replies: Mutex<VecDeque<PsOutput>>,
    }

    impl ScriptedRunner {
        pub fn reply(&self, output: PsOutput) -> &Self {
            self.replies.lock().unwrap().push_back(output);
            self
        }

        pub fn last_script(&self) -> String {
            self.scripts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ScriptRunner for ScriptedRunner {
        async fn run(&self, script: &str) -> DntResult<PsOutput> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| PsOutput::ok("")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "Name")]
        name: String,
    }

    #[test]
    fn test_parse_json_array_shapes() {
        let single = PsOutput::ok(r#"{"Name":"a"}"#);
        assert_eq!(single.parse_json_array::<Row>().unwrap().len(), 1);

        let many = PsOutput::ok(r#"[{"Name":"a"},{"Name":"b"}]"#);
        let rows = many.parse_json_array::<Row>().unwrap();
        assert_eq!(rows[1].name, "b");

        assert!(PsOutput::ok("  ").parse_json_array::<Row>().unwrap().is_empty());
        assert!(PsOutput::ok("null").parse_json_array::<Row>().unwrap().is_empty());

        let err = PsOutput::ok("{oops").parse_json_array::<Row>().unwrap_err();
        assert_eq!(err.kind, DntErrorKind::ParseError);
    }

    #[test]
    fn test_escape_and_quote() {
        assert_eq!(PsScripts::escape("it's"), "it''s");
        assert_eq!(PsScripts::quote("a'b"), "'a''b'");
        assert_eq!(PsScripts::select(&["Name", "State"]), "| Select-Object Name, State");
        assert_eq!(PsScripts::select(&[]), "");
        assert_eq!(PsScripts::ensure_array("Get-Service"), "@(Get-Service)");
    }

    #[tokio::test]
    async fn test_run_wraps_with_stop_preference() {
        let runner = Arc::new(ScriptedRunner::default());
        let ps = PsExecutor::with_runner(runner.clone());
        ps.run_void("Get-Date").await.unwrap();
        assert_eq!(runner.last_script(), "$ErrorActionPreference = 'Stop'; Get-Date");
    }

    #[tokio::test]
    async fn test_run_ok_classifies_stderr() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.reply(PsOutput::failed("Stop-Service : Access is denied"));
        runner.reply(PsOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 5,
        });
        let ps = PsExecutor::with_runner(runner);

        let err = ps.run_ok("Stop-Service x").await.unwrap_err();
        assert!(err.is_access_denied());

        let err = ps.run_ok("whatever").await.unwrap_err();
        assert_eq!(err.kind, DntErrorKind::PowerShellError);
        assert!(err.message.contains("code 5"));
    }
}
