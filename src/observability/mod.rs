//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (JSON lines or pretty)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Trace id from the inbound request flows into every upstream log line
//! - Metric updates are cheap and safe to call without an installed recorder

pub mod logging;
pub mod metrics;
