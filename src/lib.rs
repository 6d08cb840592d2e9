//! # dnt
//!
//! Command-line host for the telemetry engine. Wires the OS backend, the
//! persisted settings, the event view and tracing together, then dispatches
//! to [`commands`].

pub mod cli;
pub mod commands;
pub mod logging;
pub mod simulate;

use anyhow::Context as _;
use cli::Cli;
use commands::{Context, Outcome};
use dnt_core::SettingsStore;
use dnt_telemetry::TelemetryConfig;
use dnt_winmgmt::PowerShellHost;
use logging::LoggingOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Exit status when at least one artifact could not be changed.
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<TelemetryConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config {}", path.display()))
        }
        None => Ok(TelemetryConfig::default()),
    }
}

pub fn settings_store(path: Option<&Path>) -> anyhow::Result<SettingsStore> {
    match path {
        Some(p) => Ok(SettingsStore::new(p)),
        None => Ok(SettingsStore::default_location()?),
    }
}

/// Arguments for the background task. Explicit `--config`/`--settings` paths
/// of this run are carried over, made absolute, so the unattended run sees
/// the same signatures and settings.
pub fn self_task_arguments(base: &str, config: Option<&Path>, settings: Option<&Path>) -> String {
    let mut args = Vec::new();
    for (flag, path) in [("--config", config), ("--settings", settings)] {
        if let Some(path) = path {
            args.push(format!("{} \"{}\"", flag, absolute(path).display()));
        }
    }
    let base = base.trim();
    if !base.is_empty() {
        args.push(base.to_string());
    }
    args.join(" ")
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Run a parsed command line and map the outcome to an exit code.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = settings_store(cli.settings.as_deref())?;
    let loaded = settings.load();
    let file_logging = loaded.as_ref().map(|s| s.file_logging).unwrap_or(false);

    logging::init(&LoggingOptions {
        verbosity: cli.verbose,
        json: cli.log_json,
        file: if file_logging {
            logging::default_log_file()
        } else {
            None
        },
    })?;
    if let Err(e) = &loaded {
        tracing::warn!("Ignoring unreadable settings: {}", e);
    }

    let mut config = load_config(cli.config.as_deref())?;
    config.self_task_arguments = self_task_arguments(
        &config.self_task_arguments,
        cli.config.as_deref(),
        cli.settings.as_deref(),
    );
    let ctx = if cli.simulate {
        tracing::info!("Simulating against an in-memory machine");
        Context::new(config, Arc::new(simulate::sample_host()), settings)
    } else {
        let host = PowerShellHost::with_config(config.host.clone());
        Context::new(config, Arc::new(host), settings)
    };

    let mut stdout = std::io::stdout().lock();
    let outcome = commands::execute(&ctx, &cli.command, &mut stdout).await?;
    Ok(match outcome {
        Outcome::Success => ExitCode::SUCCESS,
        Outcome::PartialFailure => ExitCode::from(EXIT_PARTIAL_FAILURE),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_task_arguments_default_run() {
        assert_eq!(self_task_arguments("silent", None, None), "silent");
    }

    #[test]
    fn test_self_task_arguments_carry_explicit_paths() {
        let config = std::env::temp_dir().join("dnt.json");
        let args = self_task_arguments("silent", Some(&config), None);
        assert_eq!(args, format!("--config \"{}\" silent", config.display()));

        let args = self_task_arguments("silent", None, Some(Path::new("settings.json")));
        assert!(args.starts_with("--settings \""));
        assert!(args.ends_with("settings.json\" silent"));
        assert!(!args.starts_with("--settings \"settings.json"));
    }
}
