//! # Transport Routing
//!
//! Chooses between redundant transports for every remote call.
//!
//! The [`AdaptiveTransportRouter`] keeps rolling statistics per transport and
//! per method, ranks candidates on each request and falls back down the list
//! until one succeeds. Transports that keep failing a method are skipped for
//! that method only; they stay eligible for everything else.
//!
//! [`RouterRegistry`] holds one router per chain, built from configured RPC
//! endpoints.

pub mod implementations;
pub mod metrics;
pub mod registry;
pub mod router;

pub use implementations::http::HttpTransport;
pub use metrics::MetricsTable;
pub use registry::RouterRegistry;
pub use router::AdaptiveTransportRouter;
