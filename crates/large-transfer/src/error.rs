//! Transfer error taxonomy.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hpcxfer_auth::AuthError;
use hpcxfer_gateway::Error as GatewayError;
use hpcxfer_transfer::ChunkError;

/// A part PUT that did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPart {
    /// Presigned URL the part was sent to.
    pub url: String,
    pub error: String,
}

/// Errors produced by large transfers and job polling.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The job or resource is not (yet) visible. Retried only by the poller.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    /// Every part that failed, by part number. No completion was sent;
    /// the plan cannot be reused.
    #[error("{} part upload(s) failed: parts {}", .failed_parts.len(), part_list(.failed_parts))]
    PartialUpload { failed_parts: BTreeMap<usize, FailedPart> },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("job {job_id}: status not readable")]
    MalformedJobStatus { job_id: i64 },

    #[error("job {job_id} ended in state {state}{}{}", exit_suffix(.exit_code), reason_suffix(.reason))]
    TransferFailed {
        job_id: i64,
        state: String,
        reason: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("job {job_id} not found after {attempts} attempts")]
    NotFoundExhausted { job_id: i64, attempts: u32 },

    /// A streaming download failed; the partial file is left at `path`.
    #[error("download to {} failed: {source}", .path.display())]
    Download {
        path: PathBuf,
        #[source]
        source: Box<TransferError>,
    },

    #[error("file size {size} exceeds the {limit} byte limit of the direct path")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),
}

impl From<GatewayError> for TransferError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(what) => Self::NotFound(what),
            GatewayError::Auth(e) => Self::Auth(e),
            GatewayError::Json(e) => Self::MalformedResponse(e.to_string()),
            GatewayError::MissingHeader(name) => {
                Self::MalformedResponse(format!("response missing {name} header"))
            }
            GatewayError::Io(e) => Self::Io(e),
            GatewayError::FileTooLarge { size, limit } => Self::FileTooLarge { size, limit },
            other => Self::Http(other.to_string()),
        }
    }
}

fn part_list(parts: &BTreeMap<usize, FailedPart>) -> String {
    parts
        .iter()
        .map(|(number, part)| format!("{number} ({})", part.error))
        .collect::<Vec<_>>()
        .join(", ")
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason.as_deref() {
        Some(r) if !r.is_empty() => format!(": {r}"),
        _ => String::new(),
    }
}
