//! Configuration types for the aggregator.

use crate::serde_helpers::{deserialize_chain_id_map, serialize_chain_id_map};
use crate::ConfigError;
use aggregator_types::{
	CachedValueUsage, ChainId, ExpirationPolicy, FailureFallback, RouterConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Complete aggregator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
	pub service: ServiceSettings,
	/// RPC endpoints per chain
	#[serde(
		default,
		deserialize_with = "deserialize_chain_id_map",
		serialize_with = "serialize_chain_id_map"
	)]
	pub chains: HashMap<ChainId, ChainConfig>,
	#[serde(default)]
	pub router: RouterConfig,
	#[serde(default)]
	pub cache: CacheSettings,
	#[serde(default)]
	pub monitoring: MonitoringSettings,
}

/// Service identity and outer deadline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSettings {
	pub name: String,
	/// Deadline for a whole aggregated lookup; unset means no deadline.
	#[serde(default)]
	pub request_timeout_ms: Option<u64>,
	/// Per-call HTTP timeout for RPC endpoints
	#[serde(default = "default_rpc_timeout_ms")]
	pub rpc_timeout_ms: u64,
}

/// Chain-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// Chain name for logging
	pub name: String,
	/// Redundant RPC endpoints, in order of preference
	pub rpc_urls: Vec<String>,
}

fn default_rpc_timeout_ms() -> u64 {
	10_000
}

/// Cache settings as written in the config file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
	pub ttl_secs: u64,
	pub max_size: Option<usize>,
	/// Serve expired entries immediately and refresh them in the background.
	pub serve_stale: bool,
	/// Fall back to the previous value when a recomputation fails.
	pub fallback_on_error: bool,
}

impl Default for CacheSettings {
	fn default() -> Self {
		let policy = ExpirationPolicy::default();
		Self {
			ttl_secs: policy.ttl.as_secs(),
			max_size: policy.max_size,
			serve_stale: false,
			fallback_on_error: true,
		}
	}
}

impl CacheSettings {
	pub fn to_policy(&self) -> ExpirationPolicy {
		let usage = if self.serve_stale {
			CachedValueUsage::Always
		} else {
			CachedValueUsage::UntilExpiry
		};
		let fallback = if self.fallback_on_error {
			FailureFallback::Always
		} else {
			FailureFallback::Never
		};

		let policy = ExpirationPolicy::default()
			.with_ttl(Duration::from_secs(self.ttl_secs))
			.with_cached_value_usage(usage)
			.with_failure_fallback(fallback);
		match self.max_size {
			Some(max_size) => policy.with_max_size(max_size),
			None => policy,
		}
	}
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringSettings {
	pub log_level: String,
	/// `pretty`, `compact` or `json`
	pub log_format: String,
}

impl Default for MonitoringSettings {
	fn default() -> Self {
		Self {
			log_level: "info".to_string(),
			log_format: "pretty".to_string(),
		}
	}
}

impl AggregatorConfig {
	/// Outer deadline applied to every aggregated lookup.
	pub fn request_timeout(&self) -> Option<Duration> {
		self.service.request_timeout_ms.map(Duration::from_millis)
	}

	pub fn rpc_timeout(&self) -> Duration {
		Duration::from_millis(self.service.rpc_timeout_ms)
	}

	pub fn router_config(&self) -> RouterConfig {
		self.router.clone()
	}

	pub fn expiration_policy(&self) -> ExpirationPolicy {
		self.cache.to_policy()
	}

	/// RPC endpoint lists keyed by chain.
	pub fn rpc_endpoints(&self) -> HashMap<ChainId, Vec<String>> {
		self.chains
			.iter()
			.map(|(chain_id, chain)| (*chain_id, chain.rpc_urls.clone()))
			.collect()
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.service.name.trim().is_empty() {
			return Err(ConfigError::ValidationError(
				"Service name must not be empty".to_string(),
			));
		}

		if self.service.request_timeout_ms == Some(0) {
			return Err(ConfigError::ValidationError(
				"request_timeout_ms must be positive when set".to_string(),
			));
		}

		if self.service.rpc_timeout_ms == 0 {
			return Err(ConfigError::ValidationError(
				"rpc_timeout_ms must be positive".to_string(),
			));
		}

		let threshold = self.router.min_success_rate_threshold;
		if !(0.0..=1.0).contains(&threshold) {
			return Err(ConfigError::ValidationError(format!(
				"min_success_rate_threshold must be within [0, 1], got {}",
				threshold
			)));
		}

		if self.router.max_attempts_per_request == 0 {
			return Err(ConfigError::ValidationError(
				"max_attempts_per_request must be at least 1".to_string(),
			));
		}

		if self.cache.max_size == Some(0) {
			return Err(ConfigError::ValidationError(
				"cache max_size must be at least 1 when set".to_string(),
			));
		}

		for (chain_id, chain) in &self.chains {
			if chain.rpc_urls.is_empty() {
				return Err(ConfigError::ValidationError(format!(
					"Chain {} ({}) has no RPC URLs",
					chain_id, chain.name
				)));
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn minimal() -> AggregatorConfig {
		AggregatorConfig {
			service: ServiceSettings {
				name: "aggregator".to_string(),
				request_timeout_ms: Some(2_000),
				rpc_timeout_ms: default_rpc_timeout_ms(),
			},
			chains: HashMap::from([(
				ChainId(1),
				ChainConfig {
					name: "ethereum".to_string(),
					rpc_urls: vec!["https://eth.example".to_string()],
				},
			)]),
			router: RouterConfig::default(),
			cache: CacheSettings::default(),
			monitoring: MonitoringSettings::default(),
		}
	}

	#[test]
	fn test_minimal_config_is_valid() {
		let config = minimal();
		assert!(config.validate().is_ok());
		assert_eq!(config.request_timeout(), Some(Duration::from_secs(2)));
		assert_eq!(config.rpc_timeout(), Duration::from_secs(10));
		assert_eq!(config.rpc_endpoints()[&ChainId(1)].len(), 1);
	}

	#[test]
	fn test_validation_failures() {
		let mut config = minimal();
		config.router.min_success_rate_threshold = 1.5;
		assert!(config.validate().is_err());

		let mut config = minimal();
		config.router.max_attempts_per_request = 0;
		assert!(config.validate().is_err());

		let mut config = minimal();
		config.cache.max_size = Some(0);
		assert!(config.validate().is_err());

		let mut config = minimal();
		if let Some(chain) = config.chains.get_mut(&ChainId(1)) {
			chain.rpc_urls.clear();
		}
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("has no RPC URLs"));
	}

	#[test]
	fn test_cache_settings_to_policy() {
		let settings = CacheSettings {
			ttl_secs: 30,
			max_size: Some(100),
			serve_stale: true,
			fallback_on_error: false,
		};
		let policy = settings.to_policy();
		assert_eq!(policy.ttl, Duration::from_secs(30));
		assert_eq!(policy.max_size, Some(100));
		assert_eq!(policy.use_cached_value, CachedValueUsage::Always);
		assert_eq!(
			policy.use_cached_value_if_calculation_failed,
			FailureFallback::Never
		);

		assert_eq!(CacheSettings::default().to_policy(), ExpirationPolicy::default());
	}
}
