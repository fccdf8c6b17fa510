//! Prometheus metrics and structured logging for p2px.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for background passes, order transitions,
//!   per-order failures, operator alerts and notification failures

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
