//! Remote-call transport abstraction and router configuration.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// One way of reaching a remote procedure endpoint.
///
/// Several transports usually back the same logical target (redundant RPC
/// nodes for one chain); the router picks between them per call.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Human-readable label used in logs.
	fn name(&self) -> &str;

	/// Performs one remote call.
	async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// Tuning knobs for the adaptive router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
	/// Transports whose success rate falls below this value are skipped.
	pub min_success_rate_threshold: f64,
	/// Samples required before the skip rule applies to a transport.
	pub min_samples_before_skip: u64,
	/// Upper bound on transports attempted for a single request.
	pub max_attempts_per_request: usize,
	/// How long a skipped transport sits out before one trial call is let
	/// through to check whether it recovered.
	pub skip_cooldown_ms: u64,
}

impl Default for RouterConfig {
	fn default() -> Self {
		Self {
			min_success_rate_threshold: 0.05,
			min_samples_before_skip: 3,
			max_attempts_per_request: 5,
			skip_cooldown_ms: 30_000,
		}
	}
}

impl RouterConfig {
	pub fn skip_cooldown(&self) -> Duration {
		Duration::from_millis(self.skip_cooldown_ms)
	}
}

/// Rolling statistics for one `(transport, method)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransportMetrics {
	pub avg_latency_ms: f64,
	/// Fraction of successful calls, in `[0, 1]`.
	pub success_rate: f64,
	/// Calls started but not yet finished.
	pub pending_count: u32,
	pub sample_count: u64,
}

impl TransportMetrics {
	/// Weight of the success rate in [`TransportMetrics::score`].
	pub const SUCCESS_WEIGHT: f64 = 0.7;
	/// Weight of the latency term in [`TransportMetrics::score`].
	pub const LATENCY_WEIGHT: f64 = 0.3;
	/// Score used for transports with no recorded samples.
	pub const NEUTRAL_SCORE: f64 = 0.5;
	/// Samples the rolling means cover. Up to this many samples the means are
	/// exact; after that older samples decay.
	pub const ROLLING_WINDOW: u64 = 20;

	/// Ranking score: increases with success rate, decreases with latency.
	pub fn score(&self) -> f64 {
		if self.sample_count == 0 {
			return Self::NEUTRAL_SCORE;
		}
		let latency_penalty = (self.avg_latency_ms / 1000.0).min(1.0);
		self.success_rate * Self::SUCCESS_WEIGHT + (1.0 - latency_penalty) * Self::LATENCY_WEIGHT
	}

	/// Folds one finished call into the incremental means.
	pub fn record(&mut self, elapsed_ms: f64, success: bool) {
		let n = self.sample_count.min(Self::ROLLING_WINDOW - 1) as f64;
		let outcome = if success { 1.0 } else { 0.0 };
		self.avg_latency_ms = (self.avg_latency_ms * n + elapsed_ms) / (n + 1.0);
		self.success_rate = (self.success_rate * n + outcome) / (n + 1.0);
		self.sample_count += 1;
		self.pending_count = self.pending_count.saturating_sub(1);
	}

	/// True when the transport has enough samples and too low a success rate.
	pub fn should_skip(&self, config: &RouterConfig) -> bool {
		self.sample_count >= config.min_samples_before_skip
			&& self.success_rate < config.min_success_rate_threshold
	}
}
