//! Shared types for the aggregator resilience layer.
//!
//! Every other crate in the workspace depends on this one. It holds the data
//! model only: identifiers, the error taxonomy, capability levels, cache
//! expiration policy and the transport abstraction consumed by the router.

pub mod cache;
pub mod capabilities;
pub mod common;
pub mod errors;
pub mod transport;

pub use cache::*;
pub use capabilities::*;
pub use common::*;
pub use errors::{AggregatorError, Result};
pub use transport::*;
