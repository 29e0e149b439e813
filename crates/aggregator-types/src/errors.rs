//! Error types for the aggregator system.

use crate::common::CacheKey;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Errors produced by the resilience layer and the services built on it.
///
/// The enum is `Clone` because a single computation result is handed to every
/// requester waiting on the same cache key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregatorError {
	/// A cache computation failed for one key. Sibling keys are unaffected.
	#[error("Cache computation failed for key {key}: {reason}")]
	CacheComputation { key: CacheKey, reason: String },

	/// Every candidate transport was tried (or skipped) without success.
	#[error("All transports failed for method {method} after {attempts} attempt(s): {source}")]
	AllTransportsFailed {
		method: String,
		attempts: usize,
		#[source]
		source: Box<AggregatorError>,
	},

	/// An operation did not finish before its deadline.
	#[error("Timeout: {operation} did not complete within {}ms", .duration.as_millis())]
	Timeout { operation: String, duration: Duration },

	/// A polling loop ran out of attempts before its condition held.
	#[error("Exhausted retries: condition not met after {attempts} attempt(s)")]
	ExhaustedRetries { attempts: u32 },

	#[error("Transport error: {0}")]
	Transport(String),

	#[error("Source error: {0}")]
	Source(String),

	#[error("Field {field} is not supported by source {source_name}")]
	UnsupportedField { field: String, source_name: String },

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl AggregatorError {
	/// Returns true for the canonical timeout shape.
	pub fn is_timeout(&self) -> bool {
		matches!(self, AggregatorError::Timeout { .. })
	}

	/// Walks `AllTransportsFailed` chains down to the last underlying cause.
	pub fn root_cause(&self) -> &AggregatorError {
		match self {
			AggregatorError::AllTransportsFailed { source, .. } => source.root_cause(),
			other => other,
		}
	}
}

impl From<serde_json::Error> for AggregatorError {
	fn from(err: serde_json::Error) -> Self {
		AggregatorError::Serialization(err.to_string())
	}
}
