//! Per `(transport, method)` statistics.

use aggregator_types::{RouterConfig, TransportMetrics};
use dashmap::DashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
struct MetricsEntry {
	metrics: TransportMetrics,
	/// Last finished sample or granted trial call.
	last_activity: Option<Instant>,
}

/// Concurrent metrics store keyed by transport index and method name.
///
/// Entries are created lazily on the first attempt; a missing entry reads as
/// [`TransportMetrics::default`], which scores neutral.
#[derive(Debug, Default)]
pub struct MetricsTable {
	entries: DashMap<(usize, String), MetricsEntry>,
}

impl MetricsTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Copy of the current statistics for one pair.
	pub fn get(&self, index: usize, method: &str) -> TransportMetrics {
		self.entries
			.get(&(index, method.to_string()))
			.map(|entry| entry.metrics)
			.unwrap_or_default()
	}

	pub fn score(&self, index: usize, method: &str) -> f64 {
		self.get(index, method).score()
	}

	/// Applies the skip rule for one call.
	///
	/// A transport below the threshold is skipped until `skip_cooldown` has
	/// passed since its last activity. The first caller after that gets a
	/// trial call and restarts the cooldown, so concurrent callers do not all
	/// pile onto a failing transport.
	pub fn should_skip(&self, index: usize, method: &str, config: &RouterConfig) -> bool {
		let Some(mut entry) = self.entries.get_mut(&(index, method.to_string())) else {
			return false;
		};
		if !entry.metrics.should_skip(config) {
			return false;
		}

		let now = Instant::now();
		let cooled_down = entry
			.last_activity
			.map_or(true, |at| now.duration_since(at) >= config.skip_cooldown());
		if cooled_down {
			entry.last_activity = Some(now);
			return false;
		}
		true
	}

	/// Marks an attempt as started.
	pub fn begin(&self, index: usize, method: &str) {
		self.entries
			.entry((index, method.to_string()))
			.or_default()
			.metrics
			.pending_count += 1;
	}

	/// Folds a finished attempt into the statistics.
	pub fn finish(&self, index: usize, method: &str, elapsed_ms: f64, success: bool) {
		let mut entry = self.entries.entry((index, method.to_string())).or_default();
		entry.metrics.record(elapsed_ms, success);
		entry.last_activity = Some(Instant::now());
	}

	/// Releases a pending slot for an attempt that never finished.
	pub fn abandon(&self, index: usize, method: &str) {
		if let Some(mut entry) = self.entries.get_mut(&(index, method.to_string())) {
			entry.metrics.pending_count = entry.metrics.pending_count.saturating_sub(1);
		}
	}

	/// All recorded pairs, sorted by transport index then method.
	pub fn snapshot(&self) -> Vec<((usize, String), TransportMetrics)> {
		let mut all: Vec<_> = self
			.entries
			.iter()
			.map(|entry| (entry.key().clone(), entry.value().metrics))
			.collect();
		all.sort_by(|a, b| a.0.cmp(&b.0));
		all
	}
}
