//! Observability for the aggregator.
//!
//! Logging is diagnostics only: nothing in the resilience layer reads what it
//! emits. This crate installs the global `tracing` subscriber once, at process
//! start.

pub mod tracing;

pub use crate::tracing::{init_tracing, LogFormat, TracingConfig};
