//! Tracing bootstrap for the `dnt` binary.
//!
//! Library crates log through the `log` facade; the `tracing-log` bridge
//! installed by `try_init` routes those records into this subscriber.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "dnt.log";

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// 0 warn, 1 info, 2+ debug. `RUST_LOG` overrides.
    pub verbosity: u8,
    pub json: bool,
    /// Append info-level records to this file.
    pub file: Option<PathBuf>,
}

pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Default log file location, `<data dir>/dnt/dnt.log`.
pub fn default_log_file() -> Option<PathBuf> {
    dnt_core::settings::data_dir()
        .ok()
        .map(|dir| dir.join(LOG_FILE_NAME))
}

/// Install the global subscriber. Fails if one is already installed or the
/// log file cannot be opened.
pub fn init(options: &LoggingOptions) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.verbosity)));

    let json = options.json || cfg!(feature = "logs-json");
    let stderr_layer = if json {
        fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(filter)
            .boxed()
    };

    let file_layer = match &options.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::INFO)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(1), "info");
        assert_eq!(default_directive(7), "debug");
    }

    #[test]
    fn test_default_log_file_name() {
        if let Some(path) = default_log_file() {
            assert!(path.ends_with("dnt/dnt.log"));
        }
    }
}
