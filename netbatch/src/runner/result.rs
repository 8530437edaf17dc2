//! Per-device outcomes and the batch summary.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::output::LogEvent;
use crate::task::Device;

/// How one device's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunResult {
    /// Every command was sent.
    Completed,
    /// Unreachable, refused, or timed out before a session existed.
    ConnectFailed,
    /// Credentials rejected, at the transport or by an in-band login.
    AuthFailed,
    /// Escalation failed; no command was sent.
    SuperuserFailed,
    /// The session dropped part-way through the commands.
    ConnectionLost,
}

impl RunResult {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::ConnectFailed => "connect failed",
            Self::AuthFailed => "authentication failed",
            Self::SuperuserFailed => "superuser failed",
            Self::ConnectionLost => "connection lost",
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the device runner produced for one device.
#[derive(Debug, Clone)]
pub struct DeviceRun {
    pub device: Device,
    pub result: RunResult,
    /// Task commands actually written to the session.
    pub commands_sent: usize,
    /// `None` when no session was ever established.
    pub transcript: Option<Vec<u8>>,
    /// Log events in emission order.
    pub events: Vec<LogEvent>,
}

/// What the batch keeps about a device once its output has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub device: Device,
    pub result: RunResult,
    pub commands_sent: usize,
    /// File that received the transcript, when output goes to files.
    pub output_file: Option<PathBuf>,
}

/// Outcome of a whole batch run, one report per device in list order.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub task_name: String,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub reports: Vec<DeviceReport>,
    pub log_file: Option<PathBuf>,
    /// Output or log writes that failed while the batch carried on.
    pub sink_errors: Vec<String>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn completed(&self) -> usize {
        self.count(RunResult::Completed)
    }

    pub fn failed(&self) -> usize {
        self.total() - self.completed()
    }

    pub fn count(&self, result: RunResult) -> usize {
        self.reports.iter().filter(|r| r.result == result).count()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} device(s), {} completed, {} failed",
            self.task_name,
            self.total(),
            self.completed(),
            self.failed()
        )?;
        for report in self.reports.iter().filter(|r| !r.result.is_completed()) {
            write!(f, "\n  {}: {}", report.device, report.result)?;
        }
        for error in &self.sink_errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}
