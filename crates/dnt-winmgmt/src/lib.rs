//! # dnt – Windows Service and Scheduled Task Access
//!
//! Local OS interfaces consumed by the telemetry engine:
//!
//! - **Services** – enumerate `Win32_Service`, change start mode, stop / start
//! - **Scheduled Tasks** – enumerate, enable / disable, register (replace) and
//!   unregister tasks via the ScheduledTasks PowerShell module
//! - **Hosts** – [`PowerShellHost`] drives a real machine; [`MemoryHost`] is an
//!   in-memory stand-in with fault injection for tests and simulation

pub mod types;
pub mod powershell;
pub mod services;
pub mod scheduled_tasks;
pub mod host;
pub mod memory;

pub use host::PowerShellHost;
pub use memory::MemoryHost;
pub use powershell::{PsExecutor, PsOutput, ScriptRunner};
pub use scheduled_tasks::TaskScheduler;
pub use services::ServiceControl;
pub use types::*;
