//! Cache expiration policy types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default freshness window for cache entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// When an existing entry may be returned instead of recomputing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedValueUsage {
	/// Return any cached value, fresh or stale.
	Always,
	/// Always recompute.
	Never,
	/// Return only entries that have not expired.
	UntilExpiry,
}

/// Whether a previous value may stand in for a failed recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureFallback {
	Always,
	Never,
}

/// How a keyed cache decides between cached and recomputed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationPolicy {
	pub use_cached_value: CachedValueUsage,
	pub use_cached_value_if_calculation_failed: FailureFallback,
	/// Upper bound on stored entries; least recently used entries go first.
	#[serde(default)]
	pub max_size: Option<usize>,
	/// Freshness window applied to every computed entry.
	#[serde(default = "default_ttl", with = "duration_secs", rename = "ttl_secs")]
	pub ttl: Duration,
}

impl Default for ExpirationPolicy {
	fn default() -> Self {
		Self {
			use_cached_value: CachedValueUsage::UntilExpiry,
			use_cached_value_if_calculation_failed: FailureFallback::Always,
			max_size: None,
			ttl: DEFAULT_CACHE_TTL,
		}
	}
}

impl ExpirationPolicy {
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;
		self
	}

	pub fn with_max_size(mut self, max_size: usize) -> Self {
		self.max_size = Some(max_size);
		self
	}

	pub fn with_cached_value_usage(mut self, usage: CachedValueUsage) -> Self {
		self.use_cached_value = usage;
		self
	}

	pub fn with_failure_fallback(mut self, fallback: FailureFallback) -> Self {
		self.use_cached_value_if_calculation_failed = fallback;
		self
	}
}

fn default_ttl() -> Duration {
	DEFAULT_CACHE_TTL
}

mod duration_secs {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_f64(value.as_secs_f64())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		let secs = f64::deserialize(deserializer)?;
		if !secs.is_finite() || secs < 0.0 {
			return Err(serde::de::Error::custom(format!(
				"ttl_secs must be a non-negative number, got {}",
				secs
			)));
		}
		Duration::try_from_secs_f64(secs).map_err(|e| {
			serde::de::Error::custom(format!("ttl_secs {} is out of range: {}", secs, e))
		})
	}
}
