//! # Lockstep Telemetry
//!
//! Observability for the Lockstep node.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an `EnvFilter` and either a
//!   pretty or a JSON formatting layer
//! - **Metrics**: Prometheus counters and gauges on a private registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lockstep_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::from_env())?;
//!     // Application code; metrics are available via `gather_metrics()`.
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LS_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `LS_JSON_LOGS` | `false` | Emit JSON log lines |
//! | `LS_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, BLOCKS_COMMITTED, COMMITTED_HEIGHT, COMMIT_DURATION,
    ENGINE_NOTIFICATIONS, INVARIANT_CHECKS, TXS_DELIVERED, TXS_REJECTED_ANTE,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register all metrics.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)?;
    tracing::info!(service = %config.service_name, "[telemetry] initialized");
    Ok(())
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_name() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "lockstep");
    }

    #[test]
    fn test_metric_inc_macro() {
        let before = INVARIANT_CHECKS.get();
        metric_inc!(INVARIANT_CHECKS);
        assert!(INVARIANT_CHECKS.get() >= before + 1.0);
    }
}
