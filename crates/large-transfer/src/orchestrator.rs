//! Transfer orchestrator.
//!
//! Composes the multipart uploader and the job poller into single
//! upload/download operations, exposes the job-producing remote
//! filesystem operations, and picks the direct path for small files.

use std::path::Path;
use std::sync::Arc;

use hpcxfer_auth::TokenCache;
use hpcxfer_protocol::{
    CompressRequest, DownloadPlanRequest, SchedulerJob, TargetPathRequest, TransferJob,
    UploadPlanRequest,
};
use hpcxfer_transfer::split_remote_path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{GatewayApi, ObjectStorage};
use crate::cancellable;
use crate::error::TransferError;
use crate::multipart::MultipartUploader;
use crate::poller::JobPoller;
use crate::types::{PollConfig, TransferEvent, TransferPhase, UploadOptions, emit};

/// Tracks the phase of one transfer and logs every transition.
struct Tracker<'a> {
    remote: &'a str,
    phase: TransferPhase,
    events: &'a mpsc::Sender<TransferEvent>,
}

impl<'a> Tracker<'a> {
    fn new(remote: &'a str, events: &'a mpsc::Sender<TransferEvent>) -> Self {
        info!(remote, phase = %TransferPhase::PlanRequested, "transfer started");
        Self {
            remote,
            phase: TransferPhase::PlanRequested,
            events,
        }
    }

    fn advance(&mut self, next: TransferPhase) {
        debug_assert!(
            self.phase.can_advance_to(&next),
            "illegal phase transition {} -> {next}",
            self.phase
        );
        if !self.phase.can_advance_to(&next) {
            warn!(
                remote = self.remote,
                from = %self.phase,
                to = %next,
                "invalid phase transition ignored"
            );
            return;
        }
        info!(remote = self.remote, from = %self.phase, to = %next, "transfer phase");
        self.phase = next;
    }

    fn finish<T>(
        &mut self,
        result: Result<T, TransferError>,
        job_id: Option<i64>,
    ) -> Result<T, TransferError> {
        match &result {
            Ok(_) => {
                self.advance(TransferPhase::Done);
                if let Some(job_id) = job_id {
                    emit(Some(self.events), TransferEvent::Done { job_id });
                }
            }
            Err(e) => {
                error!(remote = self.remote, error = %e, "transfer failed");
                self.advance(TransferPhase::Failed(e.to_string()));
                emit(
                    Some(self.events),
                    TransferEvent::Failed {
                        error: e.to_string(),
                    },
                );
            }
        }
        result
    }
}

/// Runs large and small transfers against one gateway.
pub struct TransferOrchestrator {
    gateway: Arc<dyn GatewayApi>,
    storage: Arc<dyn ObjectStorage>,
    tokens: Arc<TokenCache>,
    account: Option<String>,
    poll: PollConfig,
    upload: UploadOptions,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
    cancel: CancellationToken,
}

impl TransferOrchestrator {
    /// Creates an orchestrator with default poll and upload options.
    pub fn new(
        gateway: Arc<dyn GatewayApi>,
        storage: Arc<dyn ObjectStorage>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            gateway,
            storage,
            tokens,
            account: None,
            poll: PollConfig::default(),
            upload: UploadOptions::default(),
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the project account charged for transfer jobs.
    pub fn with_account(mut self, account: Option<String>) -> Self {
        self.account = account;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_upload_options(mut self, upload: UploadOptions) -> Self {
        self.upload = upload;
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    /// Returns the token that cancels every operation of this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Builds a poller sharing this orchestrator's gateway and tokens.
    pub fn poller(&self) -> JobPoller {
        JobPoller::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.tokens),
            self.poll.clone(),
        )
        .with_events(self.events_tx.clone())
    }

    fn uploader(&self) -> MultipartUploader {
        MultipartUploader::new(Arc::clone(&self.storage), self.upload)
            .with_events(self.events_tx.clone())
    }

    // -----------------------------------------------------------------------
    // Large-file path
    // -----------------------------------------------------------------------

    /// Uploads `local` to the remote file `remote` through object storage.
    ///
    /// Returns the scheduler job id as soon as the completion manifest is
    /// accepted; waiting for the job is up to the caller.
    pub async fn upload_large(&self, local: &Path, remote: &str) -> Result<i64, TransferError> {
        self.run_upload(local, remote, false).await
    }

    /// Like [`upload_large`](Self::upload_large), then waits for the job.
    pub async fn upload_large_and_wait(
        &self,
        local: &Path,
        remote: &str,
    ) -> Result<i64, TransferError> {
        self.run_upload(local, remote, true).await
    }

    async fn run_upload(&self, local: &Path, remote: &str, wait: bool) -> Result<i64, TransferError> {
        let mut tracker = Tracker::new(remote, &self.events_tx);
        let mut job_id = None;
        let result = self
            .upload_steps(local, remote, wait, &mut tracker, &mut job_id)
            .await;
        tracker.finish(result, job_id)
    }

    async fn upload_steps(
        &self,
        local: &Path,
        remote: &str,
        wait: bool,
        tracker: &mut Tracker<'_>,
        job_id: &mut Option<i64>,
    ) -> Result<i64, TransferError> {
        let (dir, file_name) = split_remote_path(remote)?;
        let file_size = tokio::fs::metadata(local).await?.len();

        let req = UploadPlanRequest {
            path: dir,
            file_name,
            account: self.account.clone(),
            file_size,
        };
        let plan = cancellable(&self.cancel, self.gateway.upload_plan(&req)).await?;
        let id = plan.transfer_job.job_id;
        *job_id = Some(id);
        debug!(
            job_id = id,
            parts = plan.parts_upload_urls.len(),
            part_size = plan.max_part_size,
            "upload plan received"
        );
        emit(
            Some(&self.events_tx),
            TransferEvent::PlanReceived {
                job_id: id,
                parts: plan.parts_upload_urls.len(),
            },
        );

        tracker.advance(TransferPhase::PartsUploading);
        self.uploader().upload(local, &plan, &self.cancel).await?;
        tracker.advance(TransferPhase::CompletionSent);

        if wait {
            tracker.advance(TransferPhase::JobPolling);
            self.poller().wait_for_completion(id, &self.cancel).await?;
        }
        Ok(id)
    }

    /// Downloads the remote file `remote` into `local` through object
    /// storage.
    ///
    /// `local` is only created once the staging job has completed. If the
    /// stream breaks, the partial file is left in place and the error is
    /// [`TransferError::Download`].
    pub async fn download_large(&self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let mut tracker = Tracker::new(remote, &self.events_tx);
        let mut job_id = None;
        let result = self
            .download_steps(remote, local, &mut tracker, &mut job_id)
            .await;
        tracker.finish(result, job_id)
    }

    async fn download_steps(
        &self,
        remote: &str,
        local: &Path,
        tracker: &mut Tracker<'_>,
        job_id: &mut Option<i64>,
    ) -> Result<u64, TransferError> {
        let req = DownloadPlanRequest {
            source_path: remote.to_string(),
            account: self.account.clone(),
        };
        let plan = cancellable(&self.cancel, self.gateway.download_plan(&req)).await?;
        let id = plan.transfer_job.job_id;
        *job_id = Some(id);
        emit(
            Some(&self.events_tx),
            TransferEvent::PlanReceived { job_id: id, parts: 0 },
        );

        tracker.advance(TransferPhase::JobPolling);
        self.poller().wait_for_completion(id, &self.cancel).await?;

        tracker.advance(TransferPhase::Downloading);
        emit(
            Some(&self.events_tx),
            TransferEvent::Downloading {
                job_id: id,
                dest: local.to_path_buf(),
            },
        );
        let written = cancellable(
            &self.cancel,
            self.storage.download_to(&plan.download_url, local),
        )
        .await
        .map_err(|e| match e {
            TransferError::Cancelled => TransferError::Cancelled,
            other => TransferError::Download {
                path: local.to_path_buf(),
                source: Box::new(other),
            },
        })?;
        info!(job_id = id, bytes = written, dest = %local.display(), "download finished");
        Ok(written)
    }

    // -----------------------------------------------------------------------
    // Scheduler jobs
    // -----------------------------------------------------------------------

    /// Waits for any transfer job to complete.
    pub async fn wait_for_job(&self, job_id: i64) -> Result<SchedulerJob, TransferError> {
        self.poller().wait_for_completion(job_id, &self.cancel).await
    }

    /// Cancels a scheduler job.
    pub async fn cancel_job(&self, job_id: i64) -> Result<(), TransferError> {
        cancellable(&self.cancel, self.gateway.cancel_job(job_id)).await?;
        info!(job_id, "job cancelled");
        Ok(())
    }

    async fn and_wait(&self, job: TransferJob) -> Result<TransferJob, TransferError> {
        self.wait_for_job(job.job_id).await?;
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Remote filesystem operations
    // -----------------------------------------------------------------------

    fn target_request(&self, source: &str, target: &str) -> TargetPathRequest {
        TargetPathRequest {
            source_path: source.to_string(),
            target_path: target.to_string(),
            account: self.account.clone(),
        }
    }

    /// Starts a remote copy and returns its job.
    pub async fn copy(&self, source: &str, target: &str) -> Result<TransferJob, TransferError> {
        let req = self.target_request(source, target);
        cancellable(&self.cancel, self.gateway.copy(&req)).await
    }

    pub async fn copy_and_wait(&self, source: &str, target: &str) -> Result<TransferJob, TransferError> {
        let job = self.copy(source, target).await?;
        self.and_wait(job).await
    }

    /// Starts a remote move and returns its job.
    pub async fn move_path(&self, source: &str, target: &str) -> Result<TransferJob, TransferError> {
        let req = self.target_request(source, target);
        cancellable(&self.cancel, self.gateway.move_path(&req)).await
    }

    pub async fn move_path_and_wait(
        &self,
        source: &str,
        target: &str,
    ) -> Result<TransferJob, TransferError> {
        let job = self.move_path(source, target).await?;
        self.and_wait(job).await
    }

    /// Starts a remote recursive delete and returns its job.
    pub async fn remove(&self, path: &str) -> Result<TransferJob, TransferError> {
        cancellable(
            &self.cancel,
            self.gateway.remove(path, self.account.as_deref()),
        )
        .await
    }

    pub async fn remove_and_wait(&self, path: &str) -> Result<TransferJob, TransferError> {
        let job = self.remove(path).await?;
        self.and_wait(job).await
    }

    /// Starts a remote `tar` compression of `source` into `target`.
    pub async fn compress(
        &self,
        source: &str,
        target: &str,
        pattern: Option<&str>,
        dereference: bool,
    ) -> Result<TransferJob, TransferError> {
        let req = CompressRequest {
            source_path: source.to_string(),
            target_path: target.to_string(),
            account: self.account.clone(),
            pattern: pattern.map(str::to_string),
            dereference,
        };
        cancellable(&self.cancel, self.gateway.compress(&req)).await
    }

    pub async fn compress_and_wait(
        &self,
        source: &str,
        target: &str,
        pattern: Option<&str>,
        dereference: bool,
    ) -> Result<TransferJob, TransferError> {
        let job = self.compress(source, target, pattern, dereference).await?;
        self.and_wait(job).await
    }

    /// Starts a remote `tar` extraction of `source` into `target`.
    pub async fn extract(&self, source: &str, target: &str) -> Result<TransferJob, TransferError> {
        let req = self.target_request(source, target);
        cancellable(&self.cancel, self.gateway.extract(&req)).await
    }

    pub async fn extract_and_wait(
        &self,
        source: &str,
        target: &str,
    ) -> Result<TransferJob, TransferError> {
        let job = self.extract(source, target).await?;
        self.and_wait(job).await
    }

    // -----------------------------------------------------------------------
    // Direct path and automatic selection
    // -----------------------------------------------------------------------

    /// Uploads a small file in a single request. No job is involved.
    pub async fn upload_small(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let (dir, file_name) = split_remote_path(remote)?;
        cancellable(
            &self.cancel,
            self.gateway.upload_small(local, &dir, &file_name),
        )
        .await
    }

    /// Downloads a small file in a single request. No job is involved.
    pub async fn download_small(&self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        cancellable(&self.cancel, self.gateway.download_small(remote, local)).await
    }

    /// Uploads `local`, choosing the direct path for files up to the
    /// gateway's small-file limit. Returns the job id of a large upload.
    pub async fn upload(
        &self,
        local: &Path,
        remote: &str,
        wait: bool,
    ) -> Result<Option<i64>, TransferError> {
        let size = tokio::fs::metadata(local).await?.len();
        if size <= self.gateway.small_file_limit() {
            debug!(size, "using direct upload");
            self.upload_small(local, remote).await?;
            return Ok(None);
        }
        let job_id = if wait {
            self.upload_large_and_wait(local, remote).await?
        } else {
            self.upload_large(local, remote).await?
        };
        Ok(Some(job_id))
    }

    /// Downloads `remote`, choosing the direct path for files up to the
    /// gateway's small-file limit.
    pub async fn download(&self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let stat = cancellable(&self.cancel, self.gateway.stat(remote)).await?;
        if stat.size <= self.gateway.small_file_limit() {
            debug!(size = stat.size, "using direct download");
            return self.download_small(remote, local).await;
        }
        self.download_large(remote, local).await
    }
}
