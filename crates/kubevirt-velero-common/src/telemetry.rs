//! Logging initialization
//!
//! Sets up `tracing-subscriber` with an `EnvFilter` (honouring `RUST_LOG`)
//! and either human-readable or JSON structured output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::Error;

/// Filter applied when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,kubevirt_velero=debug,kube=info,tower=warn,hyper=warn";

/// Configuration for logging initialization
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Include the event target in each line
    pub with_target: bool,
}

/// Initialize the global tracing subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), Error> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let result = if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(config.with_target);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(config.with_target);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    result.map_err(|e| Error::internal_with_context("telemetry", e.to_string()))
}
