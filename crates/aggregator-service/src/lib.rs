//! # Aggregator Service
//!
//! Token metadata aggregation built on the resilience layer.
//!
//! Sources implement [`TokenSource`] and are registered in a
//! [`SourceRegistry`] in priority order. [`TokenMetadataService`] negotiates
//! which fields it needs from each source, caches results per token and
//! bounds every lookup with a deadline.

pub mod implementations;
pub mod service;
pub mod source;
pub mod types;

pub use implementations::RouterTokenSource;
pub use service::TokenMetadataService;
pub use source::{SourceRegistry, TokenSource};
pub use types::{TokenField, TokenKey, TokenMetadata};
