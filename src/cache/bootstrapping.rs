use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::error::TokenSourceError;
use crate::cache::token::Token;
use crate::cache::token_source::{BootstrapToken, TokenSource};
use crate::observability::metrics::get_metrics;

static BOOTSTRAP_STAGE: &str = "bootstrap";
static REBUILT_SOURCE_STAGE: &str = "rebuilt_source";

/// Either no source at all, or a fully built one. A source whose first use
/// failed is never kept.
enum Held<T> {
    Empty,
    Holding(T),
}

/// Wraps a refreshing source and rebuilds the whole chain from a new seed
/// token once the held source stops producing tokens.
///
/// Within a single call it tries the held source first, and only on failure
/// pays for a bootstrap followed by one attempt on the rebuilt source.
pub struct BootstrappingTokenSource<B, F, T> {
    held: Mutex<Held<T>>,
    bootstrapper: B,
    factory: F,
}

impl<B, F, T> BootstrappingTokenSource<B, F, T>
where
    B: BootstrapToken,
    F: Fn(Token) -> T + Send + Sync,
    T: TokenSource,
{
    /// Nothing is bootstrapped until the first call.
    pub fn new(bootstrapper: B, factory: F) -> Self {
        Self {
            held: Mutex::new(Held::Empty),
            bootstrapper,
            factory,
        }
    }

    /// Start from an already built source, e.g. one restored from storage.
    pub fn with_source(bootstrapper: B, factory: F, source: T) -> Self {
        Self {
            held: Mutex::new(Held::Holding(source)),
            bootstrapper,
            factory,
        }
    }

    pub async fn is_holding(&self) -> bool {
        matches!(*self.held.lock().await, Held::Holding(_))
    }
}

impl<B, F, T> TokenSource for BootstrappingTokenSource<B, F, T>
where
    B: BootstrapToken,
    F: Fn(Token) -> T + Send + Sync,
    T: TokenSource,
{
    async fn token_ex(&self) -> Result<Token, TokenSourceError> {
        let mut held = self.held.lock().await;

        if let Held::Holding(source) = &*held {
            match source.token_ex().await {
                Ok(token) => return Ok(token),
                Err(err) => warn!(error = %err, "held token source failed, bootstrapping a new one"),
            }
        }

        let metrics = get_metrics().await;
        metrics.bootstrap_attempts.inc();

        // a failed bootstrap leaves the current state untouched
        let seed = self.bootstrapper.bootstrap().await.map_err(|err| {
            metrics.bootstrap_failures.with_label_values(&[BOOTSTRAP_STAGE]).inc();
            warn!(error = %format!("{err:#}"), "token bootstrap failed");
            TokenSourceError::BootstrapFailed(err)
        })?;

        let source = (self.factory)(seed);
        match source.token_ex().await {
            Ok(token) => {
                info!(expiry = ?token.expiry, "token source bootstrapped");
                *held = Held::Holding(source);
                Ok(token)
            }
            Err(err) => {
                metrics.bootstrap_failures.with_label_values(&[REBUILT_SOURCE_STAGE]).inc();
                warn!(error = %err, "bootstrapped token source failed, discarding it");
                *held = Held::Empty;
                Err(TokenSourceError::InnerSourceFailed(Box::new(err)))
            }
        }
    }
}
