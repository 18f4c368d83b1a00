//! Prometheus metrics for the Lockstep node.
//!
//! All metrics follow the naming convention: `lockstep_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., blocks_committed_total)
//! - **Gauge**: Value that can go up or down (e.g., committed_height)
//! - **Histogram**: Distribution of values (e.g., commit_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

use crate::TelemetryError;

lazy_static! {
    /// Private metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // COMMIT METRICS
    // =========================================================================

    /// Total blocks committed
    pub static ref BLOCKS_COMMITTED: Counter = Counter::new(
        "lockstep_app_blocks_committed_total",
        "Total number of blocks committed to the multistore"
    ).expect("metric creation failed");

    /// Last committed height
    pub static ref COMMITTED_HEIGHT: Gauge = Gauge::new(
        "lockstep_app_committed_height",
        "Height of the last committed block"
    ).expect("metric creation failed");

    /// Commit duration, store commit plus engine notification
    pub static ref COMMIT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "lockstep_app_commit_duration_seconds",
            "Time spent committing a block and notifying the execution engine"
        ).buckets(exponential_buckets(0.0001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Commit notifications sent to the execution engine
    pub static ref ENGINE_NOTIFICATIONS: CounterVec = CounterVec::new(
        Opts::new("lockstep_bridge_engine_notifications_total", "Commit notifications sent to the execution engine"),
        &["kind"]  // kind: new/replay
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSACTION METRICS
    // =========================================================================

    /// Transactions delivered
    pub static ref TXS_DELIVERED: CounterVec = CounterVec::new(
        Opts::new("lockstep_app_txs_delivered_total", "Transactions processed by DeliverTx"),
        &["result"]  // result: ok/failed
    ).expect("metric creation failed");

    /// Transactions rejected by the ante handler
    pub static ref TXS_REJECTED_ANTE: CounterVec = CounterVec::new(
        Opts::new("lockstep_ante_txs_rejected_total", "Transactions rejected by the ante handler"),
        &["mode"]  // mode: check/deliver
    ).expect("metric creation failed");

    // =========================================================================
    // INVARIANT METRICS
    // =========================================================================

    /// Invariant routes evaluated
    pub static ref INVARIANT_CHECKS: Counter = Counter::new(
        "lockstep_crisis_invariant_checks_total",
        "Total invariant routes evaluated"
    ).expect("metric creation failed");
}

fn register_all() -> Result<(), String> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Commit
        Box::new(BLOCKS_COMMITTED.clone()),
        Box::new(COMMITTED_HEIGHT.clone()),
        Box::new(COMMIT_DURATION.clone()),
        Box::new(ENGINE_NOTIFICATIONS.clone()),
        // Transactions
        Box::new(TXS_DELIVERED.clone()),
        Box::new(TXS_REJECTED_ANTE.clone()),
        // Invariants
        Box::new(INVARIANT_CHECKS.clone()),
    ];

    for metric in metrics {
        REGISTRY.register(metric).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(register_all)
        .clone()
        .map_err(TelemetryError::MetricsInit)
}

/// Encode all metrics in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_counter_increment() {
        BLOCKS_COMMITTED.inc();
        assert!(BLOCKS_COMMITTED.get() >= 1.0);
    }

    #[test]
    fn test_labelled_counter() {
        ENGINE_NOTIFICATIONS.with_label_values(&["replay"]).inc();
        assert!(ENGINE_NOTIFICATIONS.with_label_values(&["replay"]).get() >= 1.0);
    }

    #[test]
    fn test_gather_contains_metric_names() {
        COMMITTED_HEIGHT.set(7.0);
        let text = gather_metrics().unwrap();
        assert!(text.contains("lockstep_app_committed_height"));
    }

    #[test]
    fn test_histogram_timer() {
        let _timer = HistogramTimer::new(&COMMIT_DURATION);
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}
