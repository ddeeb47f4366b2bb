use tracing::Level;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{Result, TelemetryError};

/// Output options for the process-wide subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Log at DEBUG instead of INFO for our own crates
    pub verbose: bool,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

/// Default filter used when `RUST_LOG` is not set
pub fn default_filter(level: Level) -> String {
    format!(
        "greeter_server={level},events_bus={level},telemetry={level},tonic=info,h2=warn,tower_http=info,rdkafka=warn"
    )
}

/// Install the global tracing subscriber. Fails if one is already installed.
pub fn init_tracing(options: &LogOptions) -> Result<()> {
    let level = if options.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if options.json {
        // Structured JSON logging for production
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .try_init()
    };

    installed.map_err(|e| TelemetryError::TracingError(e.to_string()))
}
