use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scheduler-side job that performs the internal data copy of a transfer.
///
/// Returned by the gateway together with an upload/download plan and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJob {
    pub job_id: i64,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub working_directory: String,
    /// Log name (`outputLog`, `errorLog`) to remote path.
    #[serde(default)]
    pub logs: HashMap<String, String>,
}

/// Live scheduler state of a job, re-fetched on every poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerJob {
    pub job_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<SchedulerJobStatus>,
    #[serde(default)]
    pub tasks: Option<Vec<SchedulerTask>>,
    #[serde(default)]
    pub time: Option<SchedulerTime>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub allocation_nodes: Option<i32>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub nodes: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub kill_request_user: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
}

/// Status block shared by jobs and their tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerJobStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub state_reason: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub interrupt_signal: Option<i32>,
}

impl SchedulerJobStatus {
    /// Returns the classified state, or `None` if the gateway sent no
    /// (or an empty) state string.
    pub fn job_state(&self) -> Option<JobState> {
        self.state
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(JobState::parse)
    }
}

/// A single step of a scheduler job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerTask {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<SchedulerJobStatus>,
    #[serde(default)]
    pub time: Option<SchedulerTime>,
}

/// Task timing, in seconds (epoch seconds for `start`/`end`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerTime {
    #[serde(default)]
    pub elapsed: Option<i64>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub suspended: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// `stat(2)` of a remote path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStat {
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub ino: u64,
    #[serde(default)]
    pub dev: u64,
    #[serde(default)]
    pub nlink: u64,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub atime: i64,
    #[serde(default)]
    pub ctime: i64,
    #[serde(default)]
    pub mtime: i64,
}

/// Classification of a scheduler state string.
///
/// Only `PENDING` and `RUNNING` are non-terminal; everything else the
/// scheduler may report (`FAILED`, `CANCELLED`, `TIMEOUT`, ...) ends the wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Other(String),
}

impl JobState {
    /// Parses a scheduler state string. Matching is exact on the upper-case
    /// names the gateway emits.
    pub fn parse(state: &str) -> Self {
        match state {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Other(s) => s,
        }
    }

    /// Returns `true` once no further state transition will occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
