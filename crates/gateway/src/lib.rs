//! HTTP clients for the HPC gateway and the object store behind it.
//!
//! [`GatewayClient`] issues bearer-authenticated requests against the
//! gateway's filesystem and compute endpoints. [`StorageClient`] talks to
//! presigned object-storage URLs, which carry their own credentials.

pub mod client;
pub mod storage;

#[cfg(test)]
mod mock;

pub use client::{DEFAULT_SMALL_FILE_LIMIT, GatewayClient, GatewayConfig};
pub use storage::StorageClient;

use std::path::Path;

use tokio::io::AsyncWriteExt;

/// Errors from the gateway and storage clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] hpcxfer_auth::AuthError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("response missing {0} header")]
    MissingHeader(&'static str),

    #[error("file size {size} exceeds the {limit} byte limit of the direct path")]
    FileTooLarge { size: u64, limit: u64 },
}

/// Maps a non-success response to [`Error::NotFound`] or [`Error::Api`].
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(body));
    }
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

/// Streams a response body into `dest`, creating or truncating it.
///
/// Returns the number of bytes written. The body is never held in memory
/// as a whole.
pub(crate) async fn stream_to_file(
    mut resp: reqwest::Response,
    dest: &Path,
) -> Result<u64, Error> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
