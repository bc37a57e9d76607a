//! Scheduler job poller.

use std::sync::Arc;

use hpcxfer_auth::TokenCache;
use hpcxfer_protocol::{JobState, SchedulerJob};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::GatewayApi;
use crate::cancellable;
use crate::error::TransferError;
use crate::types::{PollConfig, TransferEvent, emit};

/// Polls a scheduler job until it reaches a terminal state.
pub struct JobPoller {
    gateway: Arc<dyn GatewayApi>,
    tokens: Arc<TokenCache>,
    config: PollConfig,
    events: Option<mpsc::Sender<TransferEvent>>,
}

impl JobPoller {
    pub fn new(gateway: Arc<dyn GatewayApi>, tokens: Arc<TokenCache>, config: PollConfig) -> Self {
        Self {
            gateway,
            tokens,
            config,
            events: None,
        }
    }

    /// Sends a [`TransferEvent::JobPolled`] per poll to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<TransferEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Waits until `job_id` leaves `PENDING`/`RUNNING` and returns the job
    /// if it ended `COMPLETED`.
    ///
    /// The access token is checked (and refreshed if expired) before every
    /// fetch. "Not found" is tolerated `not_found_attempts` times in total;
    /// any other fetch error is returned immediately.
    pub async fn wait_for_completion(
        &self,
        job_id: i64,
        cancel: &CancellationToken,
    ) -> Result<SchedulerJob, TransferError> {
        let mut not_found_left = self.config.not_found_attempts;
        let mut delay = self.config.interval;

        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            if self.tokens.has_expired().await {
                debug!(job_id, "access token expired, refreshing");
                cancellable(cancel, async {
                    self.tokens.refresh().await.map_err(TransferError::from)
                })
                .await?;
            }

            let missed = match cancellable(cancel, self.gateway.get_job(job_id)).await {
                Ok(job) => {
                    delay = self.config.interval;
                    let state = job
                        .status
                        .as_ref()
                        .and_then(|s| s.job_state())
                        .ok_or(TransferError::MalformedJobStatus { job_id })?;

                    debug!(job_id, state = %state, "job polled");
                    emit(
                        self.events.as_ref(),
                        TransferEvent::JobPolled {
                            job_id,
                            state: Some(state.to_string()),
                        },
                    );

                    if state.is_terminal() {
                        return finish(job_id, state, job);
                    }
                    false
                }
                Err(TransferError::NotFound(what)) => {
                    not_found_left = not_found_left.saturating_sub(1);
                    emit(
                        self.events.as_ref(),
                        TransferEvent::JobPolled {
                            job_id,
                            state: None,
                        },
                    );
                    if not_found_left == 0 {
                        warn!(
                            job_id,
                            attempts = self.config.not_found_attempts,
                            "job never became visible"
                        );
                        return Err(TransferError::NotFoundExhausted {
                            job_id,
                            attempts: self.config.not_found_attempts,
                        });
                    }
                    debug!(job_id, remaining = not_found_left, %what, "job not found yet");
                    true
                }
                Err(e) => return Err(e),
            };

            cancellable(cancel, async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;

            if missed {
                delay = self.config.next_not_found_delay(delay);
            }
        }
    }
}

fn finish(job_id: i64, state: JobState, job: SchedulerJob) -> Result<SchedulerJob, TransferError> {
    if state == JobState::Completed {
        info!(job_id, "job completed");
        return Ok(job);
    }
    let status = job.status.unwrap_or_default();
    warn!(job_id, state = %state, exit_code = ?status.exit_code, "job failed");
    Err(TransferError::TransferFailed {
        job_id,
        state: state.to_string(),
        reason: status.state_reason,
        exit_code: status.exit_code,
    })
}
