//! Concrete token sources.

pub mod router_source;

pub use router_source::{RouterTokenSource, TOKEN_METADATA_METHOD};
