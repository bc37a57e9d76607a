//! Configuration, progress events and transfer phases.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

/// Job polling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay between polls.
    pub interval: Duration,
    /// Total number of "not found" observations tolerated per wait.
    pub not_found_attempts: u32,
    /// Delay multiplier applied while the job is not found. `1.0` keeps
    /// the delay fixed at `interval`.
    pub not_found_backoff: f64,
    /// Upper bound for the backed-off delay.
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            not_found_attempts: 10,
            not_found_backoff: 1.0,
            max_interval: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    /// Delay to use after another "not found", given the current delay.
    pub fn next_not_found_delay(&self, current: Duration) -> Duration {
        if self.not_found_backoff <= 1.0 {
            return self.interval;
        }
        let cap = self.max_interval.max(self.interval);
        current.mul_f64(self.not_found_backoff).min(cap)
    }
}

/// Multipart upload parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Parts in flight at once. `1` uploads strictly one after another.
    pub concurrency: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Progress event emitted during a transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// The gateway returned a plan. `parts` is zero for downloads.
    PlanReceived { job_id: i64, parts: usize },
    PartUploaded { part: usize, total: usize, bytes: u64 },
    PartFailed { part: usize, error: String },
    CompletionSent { parts: usize },
    /// One poll result. `state` is `None` while the job is not found.
    JobPolled { job_id: i64, state: Option<String> },
    Downloading { job_id: i64, dest: PathBuf },
    Done { job_id: i64 },
    Failed { error: String },
}

/// Best-effort event delivery; a full or closed channel drops the event.
pub(crate) fn emit(events: Option<&mpsc::Sender<TransferEvent>>, event: TransferEvent) {
    if let Some(tx) = events {
        let _ = tx.try_send(event);
    }
}

/// Phase of a single large transfer.
///
/// Uploads go `PlanRequested → PartsUploading → CompletionSent →
/// [JobPolling →] Done`; downloads go `PlanRequested → JobPolling →
/// Downloading → Done`. Any non-final phase may move to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPhase {
    PlanRequested,
    PartsUploading,
    CompletionSent,
    JobPolling,
    Downloading,
    Done,
    Failed(String),
}

impl TransferPhase {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Returns `true` if `next` is a legal successor of this phase.
    pub fn can_advance_to(&self, next: &TransferPhase) -> bool {
        use TransferPhase::*;
        match (self, next) {
            (Done | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (PlanRequested, PartsUploading | JobPolling) => true,
            (PartsUploading, CompletionSent) => true,
            (CompletionSent, JobPolling | Done) => true,
            (JobPolling, Downloading | Done) => true,
            (Downloading, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanRequested => f.write_str("PLAN_REQUESTED"),
            Self::PartsUploading => f.write_str("PARTS_UPLOADING"),
            Self::CompletionSent => f.write_str("COMPLETION_SENT"),
            Self::JobPolling => f.write_str("JOB_POLLING"),
            Self::Downloading => f.write_str("DOWNLOADING"),
            Self::Done => f.write_str("DONE"),
            Self::Failed(reason) => write!(f, "FAILED({reason})"),
        }
    }
}
