//! Deadlines and polling.
//!
//! Timeouts here are logical: when the deadline passes the caller stops
//! waiting and gets [`AggregatorError::Timeout`], but work that was spawned
//! elsewhere keeps running and its eventual result is discarded.

use aggregator_types::{AggregatorError, Result};
use backoff::backoff::{Backoff, Constant};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Races `future` against a timer.
///
/// With `duration = None` the future runs unmodified. On expiry the error is
/// always the canonical `Timeout` shape naming `operation`, whatever the
/// future would have returned.
pub async fn with_timeout<F, T>(operation: &str, future: F, duration: Option<Duration>) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let Some(duration) = duration else {
		return future.await;
	};

	match tokio::time::timeout(duration, future).await {
		Ok(result) => result,
		Err(_) => {
			warn!(
				"{} timed out after {}ms",
				operation,
				duration.as_millis()
			);
			Err(AggregatorError::Timeout {
				operation: operation.to_string(),
				duration,
			})
		}
	}
}

/// Polls `predicate` every `interval` until it returns true.
///
/// Fails with `ExhaustedRetries` once `max_attempts` polls returned false.
/// `None` polls until the predicate holds.
pub async fn wait_until<P, Fut>(
	mut predicate: P,
	interval: Duration,
	max_attempts: Option<u32>,
) -> Result<()>
where
	P: FnMut() -> Fut,
	Fut: Future<Output = bool>,
{
	let mut backoff = Constant::new(interval);
	let mut attempts: u32 = 0;

	loop {
		if predicate().await {
			debug!("Condition met after {} attempt(s)", attempts + 1);
			return Ok(());
		}
		attempts += 1;

		if let Some(max) = max_attempts {
			if attempts >= max {
				return Err(AggregatorError::ExhaustedRetries { attempts });
			}
		}

		// Constant backoff never runs out.
		let delay = backoff.next_backoff().unwrap_or(interval);
		tokio::time::sleep(delay).await;
	}
}

/// A deadline shared by every operation of one component.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutGuard {
	duration: Option<Duration>,
}

impl TimeoutGuard {
	pub fn new(duration: Option<Duration>) -> Self {
		Self { duration }
	}

	/// A guard that never times out.
	pub fn unbounded() -> Self {
		Self { duration: None }
	}

	pub fn duration(&self) -> Option<Duration> {
		self.duration
	}

	/// Runs `future` under this guard's deadline.
	pub async fn run<F, T>(&self, operation: &str, future: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		with_timeout(operation, future, self.duration).await
	}
}
