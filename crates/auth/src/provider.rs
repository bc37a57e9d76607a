//! Token acquisition.

use std::future::Future;
use std::pin::Pin;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::{AccessToken, AuthError, Credentials};

/// Source of fresh access tokens.
///
/// Implemented by [`ClientCredentialsProvider`]; tests substitute their own.
pub trait TokenProvider: Send + Sync {
    /// Acquires a new token from the identity provider.
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<AccessToken, AuthError>> + Send + '_>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// OAuth2 client-credentials grant against a token endpoint.
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    credentials: Credentials,
}

impl ClientCredentialsProvider {
    pub fn new(credentials: Credentials) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, credentials })
    }

    async fn request_token(&self) -> Result<AccessToken, AuthError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        let resp = self
            .http
            .post(&self.credentials.token_url)
            .header(reqwest::header::ACCEPT, "*/*")
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| AuthError::MalformedToken(format!("token response: {e}")))?;
        let raw = parsed
            .access_token
            .ok_or_else(|| AuthError::MalformedToken("access_token not found".into()))?;

        // Prefer the JWT's own expiry; opaque tokens fall back to expires_in.
        let token = match AccessToken::from_jwt(&raw) {
            Ok(token) => token,
            Err(err) => {
                let secs = parsed.expires_in.ok_or(err)?;
                AccessToken::new(raw, Utc::now() + Duration::seconds(secs))
            }
        };
        debug!(expires_at = %token.expires_at, "access token acquired");
        Ok(token)
    }
}

impl TokenProvider for ClientCredentialsProvider {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<AccessToken, AuthError>> + Send + '_>> {
        Box::pin(self.request_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::make_jwt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Starts a one-shot HTTP server and hands back the raw request it saw.
    async fn mock_token_server(
        status: u16,
        body: &str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/token");
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;

            let resp = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
            request
        });

        (url, handle)
    }

    /// Reads headers plus a `Content-Length` body, however the client
    /// splits its writes.
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    fn creds(url: String) -> Credentials {
        Credentials {
            client_id: "firecrest-client".into(),
            client_secret: "s3cr3t".into(),
            token_url: url,
        }
    }

    #[tokio::test]
    async fn fetches_jwt_and_reads_expiry() {
        let jwt = make_jwt(1_900_000_000);
        let body = format!(r#"{{"access_token":"{jwt}","token_type":"Bearer"}}"#);
        let (url, handle) = mock_token_server(200, &body).await;

        let provider = ClientCredentialsProvider::new(creds(url)).unwrap();
        let token = provider.fetch().await.unwrap();
        assert_eq!(token.token, jwt);
        assert_eq!(token.expires_at.timestamp(), 1_900_000_000);

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /token"));
        assert!(request.contains("grant_type=client_credentials"));
        assert!(request.contains("client_id=firecrest-client"));
    }

    #[tokio::test]
    async fn opaque_token_uses_expires_in() {
        let (url, handle) =
            mock_token_server(200, r#"{"access_token":"opaque","expires_in":300}"#).await;

        let provider = ClientCredentialsProvider::new(creds(url)).unwrap();
        let token = provider.fetch().await.unwrap();
        assert_eq!(token.token, "opaque");
        assert!(!token.has_expired());

        handle.abort();
    }

    #[tokio::test]
    async fn endpoint_error_is_reported() {
        let (url, handle) = mock_token_server(401, r#"{"error":"invalid_client"}"#).await;

        let provider = ClientCredentialsProvider::new(creds(url)).unwrap();
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, AuthError::TokenEndpoint { status: 401, .. }));

        handle.abort();
    }

    #[tokio::test]
    async fn missing_access_token_field() {
        let (url, handle) = mock_token_server(200, r#"{"token_type":"Bearer"}"#).await;

        let provider = ClientCredentialsProvider::new(creds(url)).unwrap();
        let err = provider.fetch().await.unwrap_err();
        assert!(err.to_string().contains("access_token"));

        handle.abort();
    }
}
