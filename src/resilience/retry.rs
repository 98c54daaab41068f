use std::fmt;

use tokio::time::{sleep, Duration, Instant};
use anyhow::Result;
use tracing::{error, warn};

/// Marks an error as not worth retrying. Wrap it with `anyhow::Error::new`
/// and [`RetrySettings::run_with_retry`] gives up immediately.
#[derive(Debug)]
pub struct Permanent(pub anyhow::Error);

impl fmt::Display for Permanent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for Permanent {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

pub fn permanent(err: impl Into<anyhow::Error>) -> anyhow::Error {
    anyhow::Error::new(Permanent(err.into()))
}

pub fn is_permanent(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Permanent>().is_some()
}

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound on the time spent retrying, sleeps included
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 1000,
            max_elapsed_ms: None,
        }
    }
}

impl RetrySettings {
    pub async fn run_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let max_elapsed = self.max_elapsed_ms.map(Duration::from_millis);
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if is_permanent(&err) {
                error!("attempt {attempt}/{attempts} failed permanently: {err:#}");
                return Err(err);
            }
            if attempt >= attempts {
                error!("all {attempt} attempts failed: {err:#}");
                return Err(err);
            }
            let pause = Duration::from_millis(delay);
            let over_budget = max_elapsed.is_some_and(|max| {
                started.elapsed().checked_add(pause).map_or(true, |total| total > max)
            });
            if over_budget {
                error!("giving up after {attempt} attempts, retry budget exhausted: {err:#}");
                return Err(err);
            }

            warn!("Attempt {attempt}/{attempts} failed: {err:#}");
            sleep(pause).await;
            delay = delay.saturating_mul(2).min(self.max_delay_ms);
        }
    }
}
