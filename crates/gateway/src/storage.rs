//! Client for presigned object-storage URLs.
//!
//! Presigned URLs carry their own signature in the query string, so no
//! `Authorization` header is ever sent. URLs are used verbatim.

use std::path::Path;

use reqwest::header::{CONTENT_TYPE, ETAG};
use tracing::debug;

use crate::{Error, check_status, stream_to_file};

/// Unauthenticated client for presigned storage requests.
#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }

    /// Uploads one part and returns the storage-assigned ETag, quotes
    /// included.
    pub async fn put_part(&self, url: &str, data: Vec<u8>) -> Result<String, Error> {
        let len = data.len();
        let resp = check_status(self.http.put(url).body(data).send().await?).await?;
        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(Error::MissingHeader("ETag"))?;
        debug!(bytes = len, etag = %etag, "part stored");
        Ok(etag)
    }

    /// Posts the completion manifest, assembling the uploaded parts.
    pub async fn post_completion(&self, url: &str, manifest_xml: String) -> Result<(), Error> {
        let req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/xml")
            .body(manifest_xml);
        check_status(req.send().await?).await?;
        Ok(())
    }

    /// Streams the object at `url` into `dest`. Returns the bytes written.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, Error> {
        let resp = check_status(self.http.get(url).send().await?).await?;
        stream_to_file(resp, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Reply, serve};

    #[tokio::test]
    async fn put_part_returns_etag_verbatim() {
        let (url, handle) =
            serve(vec![Reply::bytes(b"").with_header("ETag", "\"9b2cf535f27731c974343645a3985328\"")]).await;

        let storage = StorageClient::new().unwrap();
        let etag = storage
            .put_part(&format!("{url}/bucket/key?partNumber=1&X-Amz-Signature=abc"), b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(etag, "\"9b2cf535f27731c974343645a3985328\"");

        let seen = handle.await.unwrap();
        assert_eq!(seen[0].method, "PUT");
        assert_eq!(seen[0].target, "/bucket/key?partNumber=1&X-Amz-Signature=abc");
        assert_eq!(seen[0].body, b"hello");
        assert!(seen[0].header("authorization").is_none());
    }

    #[tokio::test]
    async fn put_part_without_etag_fails() {
        let (url, handle) = serve(vec![Reply::bytes(b"")]).await;
        let storage = StorageClient::new().unwrap();
        let err = storage.put_part(&url, vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, Error::MissingHeader("ETag")));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn put_part_rejected_by_storage() {
        let (url, handle) = serve(vec![Reply::json(403, "SignatureDoesNotMatch")]).await;
        let storage = StorageClient::new().unwrap();
        let err = storage.put_part(&url, vec![0]).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 403, .. }));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn post_completion_sends_xml() {
        let (url, handle) = serve(vec![Reply::bytes(b"<CompleteMultipartUploadResult/>")]).await;
        let storage = StorageClient::new().unwrap();
        storage
            .post_completion(&format!("{url}/bucket/key?uploadId=u1"), "<CompleteMultipartUpload/>".into())
            .await
            .unwrap();

        let seen = handle.await.unwrap();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].header("content-type"), Some("application/xml"));
        assert_eq!(seen[0].body_text(), "<CompleteMultipartUpload/>");
    }

    #[tokio::test]
    async fn download_to_writes_file() {
        let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let (url, handle) = serve(vec![Reply::bytes(&payload)]).await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("object.bin");
        let storage = StorageClient::new().unwrap();
        let written = storage.download_to(&url, &dest).await.unwrap();

        assert_eq!(written, payload.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
        handle.await.unwrap();
    }
}
