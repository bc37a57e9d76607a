//! Access tokens for the HPC gateway.
//!
//! Tokens come from an OAuth2 client-credentials grant and are shared by
//! every gateway request through a [`TokenCache`]. Long transfers outlive
//! a token, so callers re-check expiry instead of holding a token across
//! an unbounded wait.

mod cache;
mod credentials;
mod provider;
mod token;

pub use cache::TokenCache;
pub use credentials::Credentials;
pub use provider::{ClientCredentialsProvider, TokenProvider};
pub use token::AccessToken;

/// Errors produced while acquiring or refreshing a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid credentials file: {0}")]
    InvalidCredentials(#[from] serde_json::Error),

    #[error("credentials {0} not set")]
    MissingField(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("malformed token: {0}")]
    MalformedToken(String),
}
