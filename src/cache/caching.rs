use std::time::Instant;

use anyhow::Result;
use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::error::TokenSourceError;
use crate::cache::token::Token;
use crate::cache::token_source::{RefreshToken, TokenSource};
use crate::observability::metrics::get_metrics;
use crate::storage::{NoStorage, Storage};

/// Refresh lead time applied when none is configured
pub const DEFAULT_SAFETY_MARGIN_SECONDS: i64 = 60;

static SUCCESS_MSG: &str = "success";
static ERROR_MSG: &str = "error";

/// Holds one token and refreshes it on access once it is about to expire.
///
/// The lock is held for the whole read-check-refresh-merge-store sequence, so
/// at most one refresh is in flight per instance and every caller waiting on
/// it observes the merged result.
pub struct CachingTokenSource<R, S = NoStorage> {
    token: Mutex<Option<Token>>,
    refresher: R,
    store: Option<S>,
    safety_margin: Duration,
}

impl<R: RefreshToken> CachingTokenSource<R> {
    pub fn new(token: Option<Token>, refresher: R) -> Self {
        Self {
            token: Mutex::new(token),
            refresher,
            store: None,
            safety_margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECONDS),
        }
    }
}

impl<R: RefreshToken, S: Storage> CachingTokenSource<R, S> {
    /// Seed the source from whatever `store` currently holds. An empty store
    /// yields a source that reports `Uninitialized`.
    pub async fn from_storage(store: S, refresher: R) -> Result<Self> {
        let token = store.load().await?;
        if token.is_none() {
            warn!("storage holds no token");
        }

        Ok(Self {
            token: Mutex::new(token),
            refresher,
            store: Some(store),
            safety_margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECONDS),
        })
    }

    pub fn with_storage<S2: Storage>(self, store: S2) -> CachingTokenSource<R, S2> {
        CachingTokenSource {
            token: self.token,
            refresher: self.refresher,
            store: Some(store),
            safety_margin: self.safety_margin,
        }
    }

    pub fn with_safety_margin(mut self, safety_margin: Duration) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    /// Snapshot of the held token without triggering a refresh.
    pub async fn current(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }
}

impl<R: RefreshToken, S: Storage> TokenSource for CachingTokenSource<R, S> {
    async fn token_ex(&self) -> Result<Token, TokenSourceError> {
        let mut guard = self.token.lock().await;
        let held = guard.as_mut().ok_or(TokenSourceError::Uninitialized)?;

        if !held.expires_within(self.safety_margin) {
            return Ok(held.clone());
        }

        let metrics = get_metrics().await;
        let start = Instant::now();
        metrics.refresh_attempts.inc();
        debug!(expiry = ?held.expiry, "token due for refresh");

        let fresh = match self.refresher.refresh(held).await {
            Ok(fresh) => fresh,
            Err(err) => {
                metrics.refresh_failures.inc();
                metrics.refresh_duration.with_label_values(&[ERROR_MSG]).observe(start.elapsed().as_secs_f64());
                warn!(error = %format!("{err:#}"), "token refresh failed, keeping current token");
                return Err(TokenSourceError::RefreshFailed(err));
            }
        };

        held.merge(fresh);
        metrics.refresh_duration.with_label_values(&[SUCCESS_MSG]).observe(start.elapsed().as_secs_f64());
        if let Some(expiry) = held.expiry {
            metrics.token_expiry_unix.set(expiry.timestamp());
        }
        info!(expiry = ?held.expiry, "token refreshed");

        if let Some(store) = &self.store {
            store.save(held).await.map_err(|err| {
                metrics.persist_failures.inc();
                error!(error = %format!("{err:#}"), "refreshed token could not be stored");
                TokenSourceError::PersistFailed(err)
            })?;
        }

        Ok(held.clone())
    }
}
