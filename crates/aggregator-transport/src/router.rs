//! Adaptive routing across redundant transports.

use crate::metrics::MetricsTable;
use aggregator_types::{AggregatorError, Result, RouterConfig, Transport, TransportMetrics};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Routes each call to the best-scoring transport and falls back on failure.
///
/// Statistics are owned by the router instance and kept separately for every
/// `(transport index, method)` pair.
pub struct AdaptiveTransportRouter {
	transports: Vec<Arc<dyn Transport>>,
	config: RouterConfig,
	metrics: MetricsTable,
}

/// Releases the pending slot of an attempt whose future was dropped.
struct PendingAttempt<'a> {
	metrics: &'a MetricsTable,
	index: usize,
	method: &'a str,
	started: Instant,
	finished: bool,
}

impl<'a> PendingAttempt<'a> {
	fn start(metrics: &'a MetricsTable, index: usize, method: &'a str) -> Self {
		metrics.begin(index, method);
		Self {
			metrics,
			index,
			method,
			started: Instant::now(),
			finished: false,
		}
	}

	fn finish(mut self, success: bool) -> f64 {
		let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
		self.metrics
			.finish(self.index, self.method, elapsed_ms, success);
		self.finished = true;
		elapsed_ms
	}
}

impl Drop for PendingAttempt<'_> {
	fn drop(&mut self) {
		if !self.finished {
			self.metrics.abandon(self.index, self.method);
		}
	}
}

impl AdaptiveTransportRouter {
	pub fn new(transports: Vec<Arc<dyn Transport>>, config: RouterConfig) -> Self {
		Self {
			transports,
			config,
			metrics: MetricsTable::new(),
		}
	}

	pub fn config(&self) -> &RouterConfig {
		&self.config
	}

	pub fn transport_count(&self) -> usize {
		self.transports.len()
	}

	/// Current statistics for one transport and method.
	pub fn metrics(&self, index: usize, method: &str) -> TransportMetrics {
		self.metrics.get(index, method)
	}

	pub fn metrics_snapshot(&self) -> Vec<((usize, String), TransportMetrics)> {
		self.metrics.snapshot()
	}

	/// Transport indices ordered best first. Equal scores keep registration
	/// order.
	pub fn ranked(&self, method: &str) -> Vec<usize> {
		let scores: Vec<f64> = (0..self.transports.len())
			.map(|index| self.metrics.score(index, method))
			.collect();
		let mut order: Vec<usize> = (0..self.transports.len()).collect();
		order.sort_by(|a, b| {
			scores[*b]
				.partial_cmp(&scores[*a])
				.unwrap_or(Ordering::Equal)
		});
		order
	}

	/// Performs `method` on the best available transport.
	///
	/// Candidates are tried in score order until one succeeds. Transports
	/// that are failing this method are skipped and do not count as attempts,
	/// except for one trial call per `skip_cooldown`. At most
	/// `max_attempts_per_request` transports are called.
	pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
		let max_attempts = self
			.config
			.max_attempts_per_request
			.min(self.transports.len());
		let mut attempts = 0;
		let mut skipped = 0;
		let mut last_error = None;

		for index in self.ranked(method) {
			if attempts >= max_attempts {
				break;
			}
			if self.metrics.should_skip(index, method, &self.config) {
				debug!(
					"Skipping transport {} for {}: success rate below threshold",
					self.transports[index].name(),
					method
				);
				skipped += 1;
				continue;
			}

			attempts += 1;
			let transport = &self.transports[index];
			let attempt = PendingAttempt::start(&self.metrics, index, method);

			match transport.request(method, params.clone()).await {
				Ok(value) => {
					let elapsed_ms = attempt.finish(true);
					debug!(
						"{} via {} succeeded in {:.1}ms",
						method,
						transport.name(),
						elapsed_ms
					);
					return Ok(value);
				}
				Err(e) => {
					attempt.finish(false);
					warn!(
						"{} via {} failed (attempt {}/{}): {}",
						method,
						transport.name(),
						attempts,
						max_attempts,
						e
					);
					last_error = Some(e);
				}
			}
		}

		let source = last_error.unwrap_or_else(|| {
			AggregatorError::Transport(format!(
				"all transports skipped for {} ({} of {} below success threshold)",
				method,
				skipped,
				self.transports.len()
			))
		});
		Err(AggregatorError::AllTransportsFailed {
			method: method.to_string(),
			attempts,
			source: Box::new(source),
		})
	}
}
