//! Large-file transfer protocol against an HPC gateway.
//!
//! This crate implements the **transfer logic** and stays free of HTTP
//! details: the gateway and object store are reached through the
//! [`GatewayApi`] and [`ObjectStorage`] traits.
//!
//! # Upload
//!
//! 1. **Plan**: the gateway hands out one presigned URL per part
//! 2. **Parts**: the file is read part by part and PUT to each URL
//! 3. **Complete**: the ETag manifest is POSTed to the completion URL
//! 4. **Poll** (optional): wait for the scheduler job that moves the
//!    object into place
//!
//! # Download
//!
//! 1. **Plan**: presigned download URL plus a scheduler job
//! 2. **Poll**: wait for the job that stages the object
//! 3. **Stream**: copy the object into the destination file

pub mod api;
pub mod error;
pub mod multipart;
pub mod orchestrator;
pub mod poller;
pub mod types;

#[cfg(test)]
mod mock;

pub use api::{ApiFuture, GatewayApi, ObjectStorage};
pub use error::{FailedPart, TransferError};
pub use multipart::MultipartUploader;
pub use orchestrator::TransferOrchestrator;
pub use poller::JobPoller;
pub use types::{PollConfig, TransferEvent, TransferPhase, UploadOptions};

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        result = fut => result,
    }
}
