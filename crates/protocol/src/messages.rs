use serde::{Deserialize, Serialize};

use crate::types::{FileStat, SchedulerJob, TransferJob};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Asks the gateway for a multipart upload plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPlanRequest {
    /// Remote directory the file lands in.
    pub path: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub file_size: u64,
}

/// Asks the gateway to stage a remote file for download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPlanRequest {
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// Body for `cp`, `mv` and `extract` operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPathRequest {
    pub source_path: String,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// Body for the `compress` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressRequest {
    pub source_path: String,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub dereference: bool,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Presigned multipart upload plan.
///
/// `parts_upload_urls[i]` uploads part number `i + 1`; every URL is
/// single-use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUploadPlan {
    pub parts_upload_urls: Vec<String>,
    pub complete_upload_url: String,
    pub max_part_size: u64,
    pub transfer_job: TransferJob,
}

/// Presigned download plan. The URL only becomes valid once
/// `transfer_job` has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPlan {
    pub download_url: String,
    pub transfer_job: TransferJob,
}

/// Response of every job-producing filesystem operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJobResponse {
    pub transfer_job: TransferJob,
}

/// Response of `GET compute/{system}/jobs/{id}`. An empty list means the
/// scheduler does not (yet) know the job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsResponse {
    #[serde(default)]
    pub jobs: Vec<SchedulerJob>,
}

/// Response of `GET filesystem/{system}/ops/stat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStatResponse {
    #[serde(default)]
    pub output: Option<FileStat>,
}
