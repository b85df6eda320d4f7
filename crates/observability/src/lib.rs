//! Observability for the CCPI engine
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics exporter
//! - Engine metric handles (runs, scores, tier resolutions, adapter failures)
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("ccpi", LogFormat::Pretty, "info")?;
//!
//! // Optional Prometheus exporter
//! observability::metrics::init_metrics(9187)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{bootstrap_dispatch, init_logging, LogFormat};
pub use metrics::{init_metrics, EngineMetrics};
