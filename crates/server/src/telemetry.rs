//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::TelemetryConfig;

/// `RUST_LOG` when set, otherwise the configured filter, otherwise `info`.
pub fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global `fmt` subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(config: &TelemetryConfig) {
    let fmt_layer = tracing_subscriber::fmt::layer().with_ansi(config.ansi);
    let installed = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt_layer)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(filter = %config.filter, "tracing initialized");
    }
}
