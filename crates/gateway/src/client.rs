//! Gateway REST client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! The token is looked up in the shared [`TokenCache`] on every request,
//! so a refresh by any component is picked up immediately.

use std::path::Path;
use std::sync::Arc;

use hpcxfer_auth::TokenCache;
use hpcxfer_protocol::{
    CompressRequest, DownloadPlan, DownloadPlanRequest, FileStat, FileStatResponse, JobsResponse,
    MultipartUploadPlan, SchedulerJob, TargetPathRequest, TransferJob, TransferJobResponse,
    UploadPlanRequest,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{Error, check_status, stream_to_file};

/// Largest file the direct (non-staged) upload path accepts: 1 MiB.
pub const DEFAULT_SMALL_FILE_LIMIT: u64 = 1024 * 1024;

/// Characters escaped in URL path segments.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Where and how to reach the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://api.hpc.example.org`.
    pub base_url: String,
    /// Target cluster name.
    pub system: String,
    /// Size limit of the direct upload path in bytes.
    pub small_file_limit: u64,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            system: system.into(),
            small_file_limit: DEFAULT_SMALL_FILE_LIMIT,
        }
    }
}

/// Authenticated gateway client.
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
    tokens: Arc<TokenCache>,
}

impl GatewayClient {
    /// Creates a client that authenticates through `tokens`.
    pub fn new(config: GatewayConfig, tokens: Arc<TokenCache>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared token cache used for every request.
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    // -----------------------------------------------------------------------
    // Generic request helpers
    // -----------------------------------------------------------------------

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), resource)
    }

    fn system_segment(&self) -> String {
        utf8_percent_encode(&self.config.system, SEGMENT).to_string()
    }

    async fn request(&self, method: Method, resource: &str) -> Result<RequestBuilder, Error> {
        let token = self.tokens.current().await?;
        Ok(self
            .http
            .request(method, self.url(resource))
            .bearer_auth(token.token))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, Error> {
        let resp = check_status(req.send().await?).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Performs an authenticated GET and decodes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let req = self.request(Method::GET, resource).await?.query(query);
        self.send_json(req).await
    }

    /// Performs an authenticated POST with a JSON body.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T, Error> {
        let req = self.request(Method::POST, resource).await?.json(body);
        self.send_json(req).await
    }

    /// Performs an authenticated DELETE and decodes the JSON body.
    pub async fn delete_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let req = self.request(Method::DELETE, resource).await?.query(query);
        self.send_json(req).await
    }

    /// Performs an authenticated GET and returns the response for streaming.
    pub async fn get_stream(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, Error> {
        let req = self.request(Method::GET, resource).await?.query(query);
        check_status(req.send().await?).await
    }

    // -----------------------------------------------------------------------
    // Staged transfers
    // -----------------------------------------------------------------------

    fn transfer_resource(&self, op: &str) -> String {
        format!("filesystem/{}/transfer/{op}", self.system_segment())
    }

    /// Requests a multipart upload plan.
    pub async fn upload_plan(&self, req: &UploadPlanRequest) -> Result<MultipartUploadPlan, Error> {
        debug!(path = %req.path, file = %req.file_name, size = req.file_size, "requesting upload plan");
        self.post_json(&self.transfer_resource("upload"), req).await
    }

    /// Requests a presigned download of a remote file.
    pub async fn download_plan(&self, req: &DownloadPlanRequest) -> Result<DownloadPlan, Error> {
        debug!(path = %req.source_path, "requesting download plan");
        self.post_json(&self.transfer_resource("download"), req).await
    }

    /// Starts a scheduler-side copy.
    pub async fn copy(&self, req: &TargetPathRequest) -> Result<TransferJob, Error> {
        let resp: TransferJobResponse = self.post_json(&self.transfer_resource("cp"), req).await?;
        Ok(resp.transfer_job)
    }

    /// Starts a scheduler-side move.
    pub async fn move_path(&self, req: &TargetPathRequest) -> Result<TransferJob, Error> {
        let resp: TransferJobResponse = self.post_json(&self.transfer_resource("mv"), req).await?;
        Ok(resp.transfer_job)
    }

    /// Starts a scheduler-side recursive delete.
    pub async fn remove(&self, path: &str, account: Option<&str>) -> Result<TransferJob, Error> {
        let mut query = vec![("path", path)];
        if let Some(account) = account {
            query.push(("account", account));
        }
        let resp: TransferJobResponse = self
            .delete_json(&self.transfer_resource("rm"), &query)
            .await?;
        Ok(resp.transfer_job)
    }

    /// Starts a scheduler-side `tar` compression.
    pub async fn compress(&self, req: &CompressRequest) -> Result<TransferJob, Error> {
        let resp: TransferJobResponse = self
            .post_json(&self.transfer_resource("compress"), req)
            .await?;
        Ok(resp.transfer_job)
    }

    /// Starts a scheduler-side `tar` extraction.
    pub async fn extract(&self, req: &TargetPathRequest) -> Result<TransferJob, Error> {
        let resp: TransferJobResponse = self
            .post_json(&self.transfer_resource("extract"), req)
            .await?;
        Ok(resp.transfer_job)
    }

    // -----------------------------------------------------------------------
    // Scheduler
    // -----------------------------------------------------------------------

    fn job_resource(&self, job_id: i64) -> String {
        format!("compute/{}/jobs/{job_id}", self.system_segment())
    }

    /// Fetches a scheduler job. An empty `jobs` list is reported as
    /// [`Error::NotFound`].
    pub async fn get_job(&self, job_id: i64) -> Result<SchedulerJob, Error> {
        let resp: JobsResponse = self.get_json(&self.job_resource(job_id), &[]).await?;
        resp.jobs
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))
    }

    /// Cancels a scheduler job.
    pub async fn cancel_job(&self, job_id: i64) -> Result<(), Error> {
        let req = self
            .request(Method::DELETE, &self.job_resource(job_id))
            .await?;
        check_status(req.send().await?).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Direct (small file) path
    // -----------------------------------------------------------------------

    fn ops_resource(&self, op: &str) -> String {
        format!("filesystem/{}/ops/{op}", self.system_segment())
    }

    /// Stats a remote path.
    pub async fn stat(&self, path: &str) -> Result<FileStat, Error> {
        let resp: FileStatResponse = self
            .get_json(&self.ops_resource("stat"), &[("path", path)])
            .await?;
        resp.output
            .ok_or_else(|| Error::NotFound(format!("stat of {path}")))
    }

    /// Uploads a file of at most `small_file_limit` bytes in one request.
    pub async fn upload_small(
        &self,
        local: &Path,
        remote_dir: &str,
        file_name: &str,
    ) -> Result<(), Error> {
        let size = tokio::fs::metadata(local).await?.len();
        let limit = self.config.small_file_limit;
        if size > limit {
            return Err(Error::FileTooLarge { size, limit });
        }

        let data = tokio::fs::read(local).await?;
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let req = self
            .request(Method::POST, &self.ops_resource("upload"))
            .await?
            .query(&[("path", remote_dir)])
            .multipart(form);
        check_status(req.send().await?).await?;
        debug!(local = %local.display(), remote_dir, file_name, size, "small file uploaded");
        Ok(())
    }

    /// Downloads a small remote file straight to `local`.
    pub async fn download_small(&self, remote: &str, local: &Path) -> Result<u64, Error> {
        let resp = self
            .get_stream(&self.ops_resource("download"), &[("path", remote)])
            .await?;
        let written = stream_to_file(resp, local).await?;
        debug!(remote, local = %local.display(), bytes = written, "small file downloaded");
        Ok(written)
    }
}
