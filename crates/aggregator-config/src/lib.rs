//! Configuration for the aggregator service.
//!
//! Files may be TOML, JSON or YAML; the format follows the file extension.
//! Environment variables override a handful of settings after parsing, and the
//! result is validated before it is handed out.

pub mod loader;
pub mod serde_helpers;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Invalid environment override {name}: {reason}")]
	InvalidEnvOverride { name: String, reason: String },
}
