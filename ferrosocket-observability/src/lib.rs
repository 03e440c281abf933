pub mod metrics;
pub mod tracing;

pub use metrics::{
    gather_metrics, init_metrics, metrics_enabled, socket_metrics, SocketMetrics, REGISTRY,
};
pub use tracing::{init_tracing, LogFormat, TracingConfig};

/// Basic initialization for minimal overhead
pub fn init_basic_observability(service_name: &str, enable_metrics: bool) {
    if enable_metrics {
        init_metrics();
    }

    if let Err(e) = init_tracing(TracingConfig {
        service_name: service_name.to_string(),
        ..TracingConfig::default()
    }) {
        eprintln!("Failed to initialize tracing: {e}");
    }
}

/// Minimal logging setup without metrics.
/// Does nothing if a global subscriber is already installed.
pub fn init_minimal_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
