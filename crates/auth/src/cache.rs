//! Shared token cache with single-writer refresh.

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{AccessToken, AuthError, TokenProvider};

/// Caches the current access token for every gateway request.
///
/// Readers take the `RwLock` briefly; refreshes serialise on a separate
/// mutex so concurrent callers that find an expired token trigger one
/// fetch, not one each.
pub struct TokenCache {
    provider: Box<dyn TokenProvider>,
    token: RwLock<Option<AccessToken>>,
    refresh_lock: Mutex<()>,
}

impl TokenCache {
    /// Creates an empty cache. The first [`current`](Self::current) fetches.
    pub fn new(provider: Box<dyn TokenProvider>) -> Self {
        Self {
            provider,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns a valid token, fetching a new one if none is cached or the
    /// cached one has expired.
    pub async fn current(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cached_valid().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cached_valid().await {
            return Ok(token);
        }
        self.fetch_and_store().await
    }

    /// Unconditionally fetches a new token and caches it.
    pub async fn refresh(&self) -> Result<AccessToken, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await
    }

    /// Returns `true` if there is no cached token or it has expired.
    pub async fn has_expired(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .is_none_or(AccessToken::has_expired)
    }

    /// Replaces the cached token (e.g. one obtained out of band).
    pub async fn store(&self, token: AccessToken) {
        *self.token.write().await = Some(token);
    }

    async fn cached_valid(&self) -> Option<AccessToken> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| !t.has_expired())
            .cloned()
    }

    async fn fetch_and_store(&self) -> Result<AccessToken, AuthError> {
        debug!("refreshing access token");
        let token = self.provider.fetch().await?;
        info!(expires_at = %token.expires_at, "access token refreshed");
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }
}
