//! Multipart upload coordinator.
//!
//! Reads the local file once, in part order, and PUTs each part to its
//! presigned URL. Every part is attempted exactly once; the completion
//! manifest is only sent when all of them succeeded.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use hpcxfer_protocol::MultipartUploadPlan;
use hpcxfer_transfer::{CompletionManifest, PartReader, part_count};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ObjectStorage;
use crate::cancellable;
use crate::error::{FailedPart, TransferError};
use crate::types::{TransferEvent, UploadOptions, emit};

type PartOutcome = (usize, String, Result<String, TransferError>);

/// Uploads a local file against a [`MultipartUploadPlan`].
pub struct MultipartUploader {
    storage: Arc<dyn ObjectStorage>,
    options: UploadOptions,
    events: Option<mpsc::Sender<TransferEvent>>,
}

impl MultipartUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>, options: UploadOptions) -> Self {
        Self {
            storage,
            options,
            events: None,
        }
    }

    /// Sends per-part and completion events to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<TransferEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Uploads every part of `local` and sends the completion manifest.
    ///
    /// Returns part number to ETag. If any part fails the error is
    /// [`TransferError::PartialUpload`] and no completion request is made.
    pub async fn upload(
        &self,
        local: &Path,
        plan: &MultipartUploadPlan,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<usize, String>, TransferError> {
        let etags = self.upload_parts(local, plan, cancel).await?;

        let manifest = CompletionManifest::from_etags(&etags, plan.parts_upload_urls.len())?;
        cancellable(
            cancel,
            self.storage
                .post_completion(&plan.complete_upload_url, manifest.to_xml()),
        )
        .await?;

        info!(parts = manifest.len(), "multipart upload completed");
        emit(
            self.events.as_ref(),
            TransferEvent::CompletionSent {
                parts: manifest.len(),
            },
        );
        Ok(etags)
    }

    async fn upload_parts(
        &self,
        local: &Path,
        plan: &MultipartUploadPlan,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<usize, String>, TransferError> {
        if plan.max_part_size == 0 {
            return Err(TransferError::MalformedResponse(
                "upload plan has a zero maxPartSize".into(),
            ));
        }

        let mut reader = PartReader::open(local, plan.max_part_size).await?;
        let total = plan.parts_upload_urls.len();
        let expected = part_count(reader.file_size(), plan.max_part_size) as usize;
        if expected != total {
            return Err(TransferError::MalformedResponse(format!(
                "upload plan has {total} part URLs, file of {} bytes needs {expected}",
                reader.file_size()
            )));
        }

        let slots = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks: JoinSet<PartOutcome> = JoinSet::new();

        for (index, url) in plan.parts_upload_urls.iter().enumerate() {
            let number = index + 1;

            // Take a slot before reading so at most `concurrency` parts are
            // held in memory.
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                permit = Arc::clone(&slots).acquire_owned() => {
                    permit.map_err(|_| TransferError::Cancelled)?
                }
            };

            let data = match reader.next_part().await? {
                Some(part) => part.data,
                None => Vec::new(),
            };

            let storage = Arc::clone(&self.storage);
            let events = self.events.clone();
            let url = url.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let bytes = data.len() as u64;
                let outcome = storage.put_part(&url, data).await;
                match &outcome {
                    Ok(etag) => {
                        debug!(part = number, bytes, etag = %etag, "part uploaded");
                        emit(
                            events.as_ref(),
                            TransferEvent::PartUploaded {
                                part: number,
                                total,
                                bytes,
                            },
                        );
                    }
                    Err(e) => {
                        warn!(part = number, error = %e, "part upload failed");
                        emit(
                            events.as_ref(),
                            TransferEvent::PartFailed {
                                part: number,
                                error: e.to_string(),
                            },
                        );
                    }
                }
                (number, url, outcome)
            });
        }

        let mut etags = BTreeMap::new();
        let mut failed = BTreeMap::new();
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            let (number, url, outcome) = joined.map_err(std::io::Error::other)?;
            match outcome {
                Ok(etag) => {
                    etags.insert(number, etag);
                }
                Err(e) => {
                    failed.insert(
                        number,
                        FailedPart {
                            url,
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        if !failed.is_empty() {
            return Err(TransferError::PartialUpload {
                failed_parts: failed,
            });
        }
        Ok(etags)
    }
}
