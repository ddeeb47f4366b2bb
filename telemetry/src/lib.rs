//! Observability bootstrap for the greeter relay services
//!
//! - **Logs**: `tracing` subscriber with an `EnvFilter`, human-readable output
//!   in development and JSON lines in production
//! - **Metrics**: counters for published, failed, received and skipped
//!   records through the `metrics` facade. No exporter is installed here;
//!   without a recorder the counters are no-ops
//!
//! # Example
//!
//! ```rust,no_run
//! use telemetry::{init_tracing, LogOptions};
//!
//! fn main() -> Result<(), telemetry::TelemetryError> {
//!     init_tracing(&LogOptions { verbose: false, json: true })?;
//!     telemetry::describe_metrics();
//!     tracing::info!("service starting");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::*;
pub use logging::*;
pub use self::metrics::*;
