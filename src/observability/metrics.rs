use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_FAILED: &str = "failed";
pub const OUTCOME_ABORTED: &str = "aborted";
pub const OUTCOME_PARTIAL: &str = "partial";
pub const OUTCOME_CONFLICT: &str = "conflict";

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Refresh cycle metrics
    pub refresh_cycles: IntCounterVec,
    pub refresh_duration: HistogramVec,
    pub refresh_coalesced: IntCounter,
    pub tokens_in_batch: IntGauge,
    pub last_refresh_unix: IntGauge,

    // Identity source metrics
    pub identity_loads: IntCounterVec,

    // Downstream metrics
    pub publish_attempts: IntCounterVec,
    pub notifications: IntCounterVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokenrelay".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Refresh
            refresh_cycles: IntCounterVec::new(Opts::new("refresh_cycles_total", "Refresh cycles by outcome"), &["outcome"]).unwrap(),
            refresh_duration: HistogramVec::new(HistogramOpts::new("refresh_duration_seconds", "Refresh cycle duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0]), &["outcome"]).unwrap(),
            refresh_coalesced: IntCounter::new("refresh_coalesced_total", "Refresh calls joined to an in-flight cycle").unwrap(),
            tokens_in_batch: IntGauge::new("tokens_in_batch", "Tokens in the last forged batch").unwrap(),
            last_refresh_unix: IntGauge::new("last_refresh_unix_seconds", "Finish time of the last refresh cycle").unwrap(),

            // Identity source
            identity_loads: IntCounterVec::new(Opts::new("identity_loads_total", "Identity loads by tier and outcome"), &["tier", "outcome"]).unwrap(),

            // Downstream
            publish_attempts: IntCounterVec::new(Opts::new("publish_attempts_total", "Store write attempts by outcome"), &["outcome"]).unwrap(),
            notifications: IntCounterVec::new(Opts::new("notifications_total", "Notifications by kind and outcome"), &["kind", "outcome"]).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.refresh_cycles.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_coalesced.clone())).unwrap();
        reg.register(Box::new(metrics.tokens_in_batch.clone())).unwrap();
        reg.register(Box::new(metrics.last_refresh_unix.clone())).unwrap();
        reg.register(Box::new(metrics.identity_loads.clone())).unwrap();
        reg.register(Box::new(metrics.publish_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.notifications.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
