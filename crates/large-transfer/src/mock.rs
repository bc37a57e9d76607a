//! In-memory gateway, storage and token provider for tests.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use hpcxfer_auth::{AccessToken, AuthError, TokenCache, TokenProvider};
use hpcxfer_protocol::{
    CompressRequest, DownloadPlan, DownloadPlanRequest, FileStat, MultipartUploadPlan,
    SchedulerJob, SchedulerJobStatus, TargetPathRequest, TransferJob, UploadPlanRequest,
};
use hpcxfer_transfer::checksum_bytes;

use crate::api::{ApiFuture, GatewayApi, ObjectStorage};
use crate::error::TransferError;

/// Ordered record of calls across all mocks.
pub(crate) type Log = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Hands out one-hour tokens and logs every fetch as `"token"`.
pub(crate) struct LoggingProvider {
    log: Log,
}

impl TokenProvider for LoggingProvider {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<AccessToken, AuthError>> + Send + '_>> {
        Box::pin(async move {
            record(&self.log, "token");
            Ok(AccessToken::new(
                "fresh",
                Utc::now() + chrono::Duration::hours(1),
            ))
        })
    }
}

pub(crate) fn token_cache(log: &Log) -> Arc<TokenCache> {
    Arc::new(TokenCache::new(Box::new(LoggingProvider {
        log: Arc::clone(log),
    })))
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// One scripted answer to `get_job`.
#[derive(Debug, Clone)]
pub(crate) enum Poll {
    State(&'static str),
    Failed { reason: &'static str, exit_code: i32 },
    NotFound,
    NoStatus,
    ServerError,
}

pub(crate) fn transfer_job(job_id: i64) -> TransferJob {
    TransferJob {
        job_id,
        system: "cluster".into(),
        working_directory: "/home/fireuser".into(),
        logs: Default::default(),
    }
}

pub(crate) struct MockGateway {
    pub log: Log,
    pub upload_plan: Mutex<Option<MultipartUploadPlan>>,
    pub download_plan: Mutex<Option<DownloadPlan>>,
    pub polls: Mutex<VecDeque<Poll>>,
    pub plan_requests: Mutex<Vec<UploadPlanRequest>>,
    pub target_requests: Mutex<Vec<TargetPathRequest>>,
    /// Poll number (1-based) after which the cached token is expired.
    pub expire_token_on_poll: Option<(usize, Arc<TokenCache>)>,
    /// File whose existence is sampled on every poll.
    pub watch: Option<PathBuf>,
    pub watched: Mutex<Vec<bool>>,
    pub small_file_limit: u64,
    pub remote_size: u64,
    polled: Mutex<usize>,
}

impl MockGateway {
    pub fn new(log: &Log) -> Self {
        Self {
            log: Arc::clone(log),
            upload_plan: Mutex::new(None),
            download_plan: Mutex::new(None),
            polls: Mutex::new(VecDeque::new()),
            plan_requests: Mutex::new(Vec::new()),
            target_requests: Mutex::new(Vec::new()),
            expire_token_on_poll: None,
            watch: None,
            watched: Mutex::new(Vec::new()),
            small_file_limit: 1024 * 1024,
            remote_size: 0,
            polled: Mutex::new(0),
        }
    }

    pub fn with_polls(self, polls: impl IntoIterator<Item = Poll>) -> Self {
        *self.polls.lock().unwrap() = polls.into_iter().collect();
        self
    }

    pub fn poll_count(&self) -> usize {
        *self.polled.lock().unwrap()
    }

    fn job_ok(&self) -> ApiFuture<'_, TransferJob> {
        Box::pin(async move { Ok(transfer_job(42)) })
    }
}

fn job_in(job_id: i64, status: SchedulerJobStatus) -> SchedulerJob {
    SchedulerJob {
        job_id,
        status: Some(status),
        ..SchedulerJob::default()
    }
}

impl GatewayApi for MockGateway {
    fn upload_plan<'a>(&'a self, req: &'a UploadPlanRequest) -> ApiFuture<'a, MultipartUploadPlan> {
        Box::pin(async move {
            record(&self.log, "upload_plan");
            self.plan_requests.lock().unwrap().push(req.clone());
            self.upload_plan
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| TransferError::Http("no upload plan scripted".into()))
        })
    }

    fn download_plan<'a>(&'a self, _req: &'a DownloadPlanRequest) -> ApiFuture<'a, DownloadPlan> {
        Box::pin(async move {
            record(&self.log, "download_plan");
            self.download_plan
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| TransferError::Http("no download plan scripted".into()))
        })
    }

    fn get_job(&self, job_id: i64) -> ApiFuture<'_, SchedulerJob> {
        Box::pin(async move {
            record(&self.log, "get_job");
            let count = {
                let mut polled = self.polled.lock().unwrap();
                *polled += 1;
                *polled
            };
            if let Some(path) = &self.watch {
                self.watched.lock().unwrap().push(path.exists());
            }
            if let Some((on, cache)) = &self.expire_token_on_poll
                && *on == count
            {
                cache
                    .store(AccessToken::new("stale", Utc::now() - chrono::Duration::minutes(1)))
                    .await;
            }

            let next = self.polls.lock().unwrap().pop_front();
            match next {
                Some(Poll::State(state)) => Ok(job_in(
                    job_id,
                    SchedulerJobStatus {
                        state: Some(state.into()),
                        ..SchedulerJobStatus::default()
                    },
                )),
                Some(Poll::Failed { reason, exit_code }) => Ok(job_in(
                    job_id,
                    SchedulerJobStatus {
                        state: Some("FAILED".into()),
                        state_reason: Some(reason.into()),
                        exit_code: Some(exit_code),
                        interrupt_signal: None,
                    },
                )),
                Some(Poll::NotFound) => Err(TransferError::NotFound(format!("job {job_id}"))),
                Some(Poll::NoStatus) => Ok(SchedulerJob {
                    job_id,
                    ..SchedulerJob::default()
                }),
                Some(Poll::ServerError) => Err(TransferError::Http("API error 500".into())),
                None => Err(TransferError::Http("poll script exhausted".into())),
            }
        })
    }

    fn cancel_job(&self, _job_id: i64) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            record(&self.log, "cancel_job");
            Ok(())
        })
    }

    fn copy<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob> {
        record(&self.log, "copy");
        self.target_requests.lock().unwrap().push(req.clone());
        self.job_ok()
    }

    fn move_path<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob> {
        record(&self.log, "move");
        self.target_requests.lock().unwrap().push(req.clone());
        self.job_ok()
    }

    fn remove<'a>(&'a self, path: &'a str, _account: Option<&'a str>) -> ApiFuture<'a, TransferJob> {
        record(&self.log, format!("remove {path}"));
        self.job_ok()
    }

    fn compress<'a>(&'a self, req: &'a CompressRequest) -> ApiFuture<'a, TransferJob> {
        record(&self.log, format!("compress {:?}", req.pattern));
        self.job_ok()
    }

    fn extract<'a>(&'a self, req: &'a TargetPathRequest) -> ApiFuture<'a, TransferJob> {
        record(&self.log, "extract");
        self.target_requests.lock().unwrap().push(req.clone());
        self.job_ok()
    }

    fn stat<'a>(&'a self, _path: &'a str) -> ApiFuture<'a, FileStat> {
        Box::pin(async move {
            record(&self.log, "stat");
            Ok(FileStat {
                size: self.remote_size,
                ..FileStat::default()
            })
        })
    }

    fn upload_small<'a>(
        &'a self,
        _local: &'a Path,
        remote_dir: &'a str,
        file_name: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            record(&self.log, format!("upload_small {remote_dir} {file_name}"));
            Ok(())
        })
    }

    fn download_small<'a>(&'a self, remote: &'a str, _local: &'a Path) -> ApiFuture<'a, u64> {
        Box::pin(async move {
            record(&self.log, format!("download_small {remote}"));
            Ok(0)
        })
    }

    fn small_file_limit(&self) -> u64 {
        self.small_file_limit
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

pub(crate) struct MockStorage {
    pub log: Log,
    /// URLs whose PUT is rejected.
    pub failing: HashSet<String>,
    /// Body received per part URL.
    pub received: Mutex<BTreeMap<String, Vec<u8>>>,
    pub completions: Mutex<Vec<(String, String)>>,
    /// Object served by `download_to`.
    pub object: Vec<u8>,
    /// Bytes written before a simulated broken stream.
    pub break_download_after: Option<usize>,
    pub put_delay: Option<Duration>,
    in_flight: Mutex<(usize, usize)>,
}

impl MockStorage {
    pub fn new(log: &Log) -> Self {
        Self {
            log: Arc::clone(log),
            failing: HashSet::new(),
            received: Mutex::new(BTreeMap::new()),
            completions: Mutex::new(Vec::new()),
            object: Vec::new(),
            break_download_after: None,
            put_delay: None,
            in_flight: Mutex::new((0, 0)),
        }
    }

    /// Highest number of PUTs observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().1
    }

    /// ETag the mock assigns to a part body.
    pub fn etag_for(data: &[u8]) -> String {
        format!("\"{}\"", &checksum_bytes(data)[..32])
    }
}

impl ObjectStorage for MockStorage {
    fn put_part<'a>(&'a self, url: &'a str, data: Vec<u8>) -> ApiFuture<'a, String> {
        Box::pin(async move {
            record(&self.log, format!("put {url}"));
            {
                let mut flight = self.in_flight.lock().unwrap();
                flight.0 += 1;
                flight.1 = flight.1.max(flight.0);
            }
            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.lock().unwrap().0 -= 1;

            if self.failing.contains(url) {
                return Err(TransferError::Http("API error 503: SlowDown".into()));
            }
            let etag = Self::etag_for(&data);
            self.received.lock().unwrap().insert(url.to_string(), data);
            Ok(etag)
        })
    }

    fn post_completion<'a>(&'a self, url: &'a str, manifest_xml: String) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            record(&self.log, "complete");
            self.completions
                .lock()
                .unwrap()
                .push((url.to_string(), manifest_xml));
            Ok(())
        })
    }

    fn download_to<'a>(&'a self, _url: &'a str, dest: &'a Path) -> ApiFuture<'a, u64> {
        Box::pin(async move {
            record(&self.log, "download");
            if let Some(n) = self.break_download_after {
                tokio::fs::write(dest, &self.object[..n]).await?;
                return Err(TransferError::Http("connection reset".into()));
            }
            tokio::fs::write(dest, &self.object).await?;
            Ok(self.object.len() as u64)
        })
    }
}
