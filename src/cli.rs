//! Command-line definition.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Detect and toggle NVIDIA telemetry services and scheduled tasks.
#[derive(Debug, Parser)]
#[command(name = "dnt", version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Engine configuration file (JSON). Defaults are used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Settings file. Defaults to `<config dir>/dnt/settings.json`.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Run against a built-in in-memory machine instead of the real one.
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Increase stderr log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit stderr logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List telemetry artifacts with their current state.
    Status {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Disable telemetry artifacts.
    Disable(DisableArgs),

    /// Re-enable every telemetry artifact (restore defaults).
    Enable {
        /// Do not print the event log.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Disable everything without interaction. Used by the background task.
    Silent,

    /// Manage the background task.
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Show or change persisted settings.
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Debug, Args)]
pub struct DisableArgs {
    /// Only touch services.
    #[arg(long, conflicts_with = "tasks_only")]
    pub services_only: bool,

    /// Only touch scheduled tasks.
    #[arg(long)]
    pub tasks_only: bool,

    /// Leave running services running; only prevent future starts.
    #[arg(long)]
    pub no_stop: bool,

    /// Do not print the event log.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Show whether the background task exists and its trigger.
    Status,
    /// Create or replace the background task.
    Create {
        /// Trigger; defaults to the persisted selection.
        #[arg(long, value_enum)]
        trigger: Option<TriggerArg>,
    },
    /// Remove the background task if present.
    Remove,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        file_logging: Option<bool>,
        #[arg(long)]
        startup_update_check: Option<bool>,
        /// Background task trigger to persist.
        #[arg(long, value_enum)]
        trigger: Option<TriggerArg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TriggerArg {
    Logon,
    Daily,
    Hourly,
    Idle,
}

impl From<TriggerArg> for dnt_telemetry::SelfTaskTrigger {
    fn from(t: TriggerArg) -> Self {
        match t {
            TriggerArg::Logon => Self::AtLogon,
            TriggerArg::Daily => Self::Daily,
            TriggerArg::Hourly => Self::Hourly,
            TriggerArg::Idle => Self::OnIdle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_disable_flags() {
        let cli = Cli::parse_from(["dnt", "--simulate", "disable", "--tasks-only", "--no-stop"]);
        assert!(cli.simulate);
        match cli.command {
            Command::Disable(args) => {
                assert!(args.tasks_only);
                assert!(args.no_stop);
                assert!(!args.services_only);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_services_and_tasks_only_conflict() {
        assert!(Cli::try_parse_from(["dnt", "disable", "--services-only", "--tasks-only"]).is_err());
    }

    #[test]
    fn test_parse_task_create_trigger() {
        let cli = Cli::parse_from(["dnt", "task", "create", "--trigger", "hourly"]);
        match cli.command {
            Command::Task {
                action: TaskCommand::Create { trigger },
            } => assert_eq!(trigger, Some(TriggerArg::Hourly)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_settings_set() {
        let cli = Cli::parse_from(["dnt", "settings", "set", "--file-logging", "true", "--trigger", "idle"]);
        match cli.command {
            Command::Settings {
                action:
                    SettingsCommand::Set {
                        file_logging,
                        startup_update_check,
                        trigger,
                    },
            } => {
                assert_eq!(file_logging, Some(true));
                assert_eq!(startup_update_check, None);
                assert_eq!(trigger, Some(TriggerArg::Idle));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
