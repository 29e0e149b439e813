//! Concrete transport implementations.

pub mod http;
