//! Wire types for the HPC gateway REST API.
//!
//! JSON field names follow the gateway's camelCase convention. Unknown
//! fields are ignored and most fields are optional, since different
//! scheduler backends fill in different subsets.

pub mod messages;
pub mod types;

pub use messages::{
    CompressRequest, DownloadPlan, DownloadPlanRequest, FileStatResponse, JobsResponse,
    MultipartUploadPlan, TargetPathRequest, TransferJobResponse, UploadPlanRequest,
};
pub use types::{
    FileStat, JobState, SchedulerJob, SchedulerJobStatus, SchedulerTask, SchedulerTime,
    TransferJob,
};
