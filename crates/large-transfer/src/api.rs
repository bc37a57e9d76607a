//! Capability traits consumed by the transfer core.
//!
//! `GatewayApi` and `ObjectStorage` decouple the poller, uploader and
//! orchestrator from HTTP so they can be driven by in-memory mocks. The
//! adapters at the bottom bridge them to the real clients.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use hpcxfer_gateway::{GatewayClient, StorageClient};
use hpcxfer_protocol::{
    CompressRequest, DownloadPlan, DownloadPlanRequest, FileStat, MultipartUploadPlan,
    SchedulerJob, TargetPathRequest, TransferJob, UploadPlanRequest,
};

use crate::error::TransferError;

/// Boxed future returned by the capability traits.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransferError>> + Send + 'a>>;

/// Authenticated gateway operations.
///
/// Implementations report a job or path the gateway does not know as
/// [`TransferError::NotFound`].
pub trait GatewayApi: Send + Sync {
    fn upload_plan<'a>(&'a self, req: &'a UploadPlanRequest) -> ApiFuture<'a, MultipartUploadPlan>;

    fn download_plan<'a>(&'a self, req: &'a DownloadPlanRequest) -> ApiFuture<'a, DownloadPlan>;

    fn get_job(&self, job_id: i64) -> ApiFuture<'_, SchedulerJob>;

    fn cancel_job(&self, job_id: i64) -> ApiFuture<'_, ()>;

    fn copy<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob>;

    fn move_path<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob>;

    fn remove<'a>(&'a self, path: &'a str, account: Option<&'a str>) -> ApiFuture<'a, TransferJob>;

    fn compress<'a>(&'a self, req: &'a CompressRequest) -> ApiFuture<'a, TransferJob>;

    fn extract<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob>;

    fn stat<'a>(&'a self, path: &'a str) -> ApiFuture<'a, FileStat>;

    fn upload_small<'a>(
        &'a self,
        local: &'a Path,
        remote_dir: &'a str,
        file_name: &'a str,
    ) -> ApiFuture<'a, ()>;

    fn download_small<'a>(&'a self, remote: &'a str, local: &'a Path) -> ApiFuture<'a, u64>;

    /// Largest file the direct path accepts.
    fn small_file_limit(&self) -> u64;
}

/// Presigned object-storage operations.
pub trait ObjectStorage: Send + Sync {
    /// Uploads one part and returns its ETag verbatim.
    fn put_part<'a>(&'a self, url: &'a str, data: Vec<u8>) -> ApiFuture<'a, String>;

    /// Sends the completion manifest.
    fn post_completion<'a>(&'a self, url: &'a str, manifest_xml: String) -> ApiFuture<'a, ()>;

    /// Streams an object into `dest`, creating or truncating it.
    fn download_to<'a>(&'a self, url: &'a str, dest: &'a Path) -> ApiFuture<'a, u64>;
}

impl GatewayApi for GatewayClient {
    fn upload_plan<'a>(&'a self, req: &'a UploadPlanRequest) -> ApiFuture<'a, MultipartUploadPlan> {
        Box::pin(async move { Ok(GatewayClient::upload_plan(self, req).await?) })
    }

    fn download_plan<'a>(&'a self, req: &'a DownloadPlanRequest) -> ApiFuture<'a, DownloadPlan> {
        Box::pin(async move { Ok(GatewayClient::download_plan(self, req).await?) })
    }

    fn get_job(&self, job_id: i64) -> ApiFuture<'_, SchedulerJob> {
        Box::pin(async move { Ok(GatewayClient::get_job(self, job_id).await?) })
    }

    fn cancel_job(&self, job_id: i64) -> ApiFuture<'_, ()> {
        Box::pin(async move { Ok(GatewayClient::cancel_job(self, job_id).await?) })
    }

    fn copy<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob> {
        Box::pin(async move { Ok(GatewayClient::copy(self, req).await?) })
    }

    fn move_path<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob> {
        Box::pin(async move { Ok(GatewayClient::move_path(self, req).await?) })
    }

    fn remove<'a>(&'a self, path: &'a str, account: Option<&'a str>) -> ApiFuture<'a, TransferJob> {
        Box::pin(async move { Ok(GatewayClient::remove(self, path, account).await?) })
    }

    fn compress<'a>(&'a self, req: &'a CompressRequest) -> ApiFuture<'a, TransferJob> {
        Box::pin(async move { Ok(GatewayClient::compress(self, req).await?) })
    }

    fn extract<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob> {
        Box::pin(async move { Ok(GatewayClient::extract(self, req).await?) })
    }

    fn stat<'a>(&'a self, path: &'a str) -> ApiFuture<'a, FileStat> {
        Box::pin(async move { Ok(GatewayClient::stat(self, path).await?) })
    }

    fn upload_small<'a>(
        &'a self,
        local: &'a Path,
        remote_dir: &'a str,
        file_name: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            Ok(GatewayClient::upload_small(self, local, remote_dir, file_name).await?)
        })
    }

    fn download_small<'a>(&'a self, remote: &'a str, local: &'a Path) -> ApiFuture<'a, u64> {
        Box::pin(async move { Ok(GatewayClient::download_small(self, remote, local).await?) })
    }

    fn small_file_limit(&self) -> u64 {
        self.config().small_file_limit
    }
}

impl ObjectStorage for StorageClient {
    fn put_part<'a>(&'a self, url: &'a str, data: Vec<u8>) -> ApiFuture<'a, String> {
        Box::pin(async move { Ok(StorageClient::put_part(self, url, data).await?) })
    }

    fn post_completion<'a>(&'a self, url: &'a str, manifest_xml: String) -> ApiFuture<'a, ()> {
        Box::pin(async move { Ok(StorageClient::post_completion(self, url, manifest_xml).await?) })
    }

    fn download_to<'a>(&'a self, url: &'a str, dest: &'a Path) -> ApiFuture<'a, u64> {
        Box::pin(async move { Ok(StorageClient::download_to(self, url, dest).await?) })
    }
}
