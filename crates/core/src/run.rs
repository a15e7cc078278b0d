//! Pipeline runs, their status and collected logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-assigned identifier of a run (GitHub workflow run id, GitLab pipeline id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RunId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Status of a run as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Queued, waiting, or created but not started
    Pending,
    /// Executing
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with a failure
    Failed,
    /// Cancelled or skipped
    Canceled,
}

impl RunStatus {
    /// Whether the run will not change state any more.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Output of one job (or log file) of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Job or file name
    pub name: String,
    /// Log text
    pub content: String,
}

/// All logs retrieved for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBundle {
    /// Per-job entries in platform order
    pub entries: Vec<LogEntry>,
}

impl LogBundle {
    /// Bundle from a list of entries.
    #[must_use]
    pub const fn new(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    /// Append one entry.
    pub fn push(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.entries.push(LogEntry {
            name: name.into(),
            content: content.into(),
        });
    }

    /// Whether no log entry was retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total log size in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.content.len()).sum()
    }
}
