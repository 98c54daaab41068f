use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Refresh metrics
    pub refresh_attempts: IntCounter,
    pub refresh_failures: IntCounter,
    pub refresh_duration: HistogramVec,
    pub persist_failures: IntCounter,

    // Bootstrap metrics
    pub bootstrap_attempts: IntCounter,
    pub bootstrap_failures: IntCounterVec,

    // Token state
    pub token_expiry_unix: IntGauge,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokenkeeper".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Refresh
            refresh_attempts: IntCounter::new("refresh_attempts_total", "Total refresh attempts").unwrap(),
            refresh_failures: IntCounter::new("refresh_failures_total", "Refresh attempts that failed").unwrap(),
            refresh_duration: HistogramVec::new(HistogramOpts::new("refresh_duration_seconds", "Refresh duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["outcome"],).unwrap(),
            persist_failures: IntCounter::new("persist_failures_total", "Refreshed tokens that could not be stored").unwrap(),

            // Bootstrap
            bootstrap_attempts: IntCounter::new("bootstrap_attempts_total", "Total bootstrap attempts").unwrap(),
            bootstrap_failures: IntCounterVec::new(Opts::new("bootstrap_failures_total", "Bootstrap failures by stage"),&["stage"],).unwrap(),

            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the currently held token").unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.refresh_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_failures.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.persist_failures.clone())).unwrap();
        reg.register(Box::new(metrics.bootstrap_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.bootstrap_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
