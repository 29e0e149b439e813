//! Keyed cache of asynchronous results.
//!
//! `KeyedAsyncCache` sits in front of an injected batch computation. Requested
//! keys are split into fresh hits, stale hits the policy allows serving, and
//! keys that must be recomputed. Keys to recompute are gathered into one open
//! batch that concurrent callers can join until it is dispatched, and each key
//! belongs to at most one in-flight batch at a time.
//!
//! # Concurrency
//!
//! Batches run on their own tokio task. A caller that stops waiting (for
//! example because its timeout fired) does not cancel the computation; the
//! result still lands in the cache for the next caller.

pub mod entry;

use aggregator_core::with_timeout;
use aggregator_types::{
	AggregatorError, CacheKey, CachedValueUsage, ExpirationPolicy, FailureFallback, IntoCacheKey,
	Result,
};
use async_trait::async_trait;
use entry::EntryTable;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

pub use entry::CacheEntry;

/// Computes values for a batch of keys.
///
/// Keys missing from the returned map are treated as failed for that key
/// only. An `Err` fails every key of the batch.
#[async_trait]
pub trait BatchCalculator<K, V>: Send + Sync {
	async fn calculate(&self, keys: Vec<K>) -> Result<HashMap<K, V>>;
}

#[async_trait]
impl<K, V, F, Fut> BatchCalculator<K, V> for F
where
	K: Send + 'static,
	V: Send + 'static,
	F: Fn(Vec<K>) -> Fut + Send + Sync,
	Fut: Future<Output = Result<HashMap<K, V>>> + Send,
{
	async fn calculate(&self, keys: Vec<K>) -> Result<HashMap<K, V>> {
		(self)(keys).await
	}
}

/// Where a returned value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
	/// Cached and inside its freshness window.
	Fresh,
	/// Cached but expired; served because the policy allows it.
	Stale,
	/// Recomputed for this request.
	Computed,
	/// Recomputation failed; the previous value stands in.
	Fallback,
}

/// A value returned by the cache with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<V> {
	pub value: V,
	pub freshness: Freshness,
}

type BatchOutcome<K, V> = std::result::Result<Arc<HashMap<K, V>>, AggregatorError>;
/// Resolves to `None` when the batch task went away without reporting.
type SharedBatch<K, V> = Shared<BoxFuture<'static, Option<BatchOutcome<K, V>>>>;

/// Batch still accepting keys.
struct OpenBatch<K, V> {
	id: u64,
	keys: Vec<K>,
	sender: oneshot::Sender<BatchOutcome<K, V>>,
	outcome: SharedBatch<K, V>,
}

impl<K: Send + Sync + 'static, V: Send + Sync + 'static> OpenBatch<K, V> {
	fn new(id: u64, first_key: K) -> Self {
		let (sender, receiver) = oneshot::channel::<BatchOutcome<K, V>>();
		let outcome = receiver.map(|received| received.ok()).boxed().shared();
		Self {
			id,
			keys: vec![first_key],
			sender,
			outcome,
		}
	}
}

struct CacheState<K, V> {
	entries: EntryTable<V>,
	/// In-flight batch id and result per key.
	pending: HashMap<CacheKey, (u64, SharedBatch<K, V>)>,
	open_batch: Option<OpenBatch<K, V>>,
	next_batch_id: u64,
}

struct CacheInner<K, V> {
	calculator: Arc<dyn BatchCalculator<K, V>>,
	policy: ExpirationPolicy,
	state: Mutex<CacheState<K, V>>,
}

/// Generic single-flight cache over an injected batch computation.
pub struct KeyedAsyncCache<K, V> {
	inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for KeyedAsyncCache<K, V> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<K, V> KeyedAsyncCache<K, V>
where
	K: IntoCacheKey + Eq + Hash + Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
{
	/// Creates a cache over `calculator`, which may be a closure
	/// `Fn(Vec<K>) -> impl Future<Output = Result<HashMap<K, V>>>`.
	pub fn new<C>(calculator: C, policy: ExpirationPolicy) -> Self
	where
		C: BatchCalculator<K, V> + 'static,
	{
		Self::with_calculator(Arc::new(calculator), policy)
	}

	pub fn with_calculator(
		calculator: Arc<dyn BatchCalculator<K, V>>,
		policy: ExpirationPolicy,
	) -> Self {
		let entries = EntryTable::new(policy.max_size);
		Self {
			inner: Arc::new(CacheInner {
				calculator,
				policy,
				state: Mutex::new(CacheState {
					entries,
					pending: HashMap::new(),
					open_batch: None,
					next_batch_id: 0,
				}),
			}),
		}
	}

	pub fn policy(&self) -> &ExpirationPolicy {
		&self.inner.policy
	}

	/// Returns values for `keys`, computing whatever the policy does not let
	/// the cache answer. Keys whose computation failed are left out of the map.
	///
	/// `timeout` bounds the whole wait with the canonical timeout error.
	pub async fn get_or_calculate<I>(
		&self,
		keys: I,
		timeout: Option<Duration>,
	) -> Result<HashMap<K, V>>
	where
		I: IntoIterator<Item = K>,
	{
		let detailed = self.get_or_calculate_detailed(keys, timeout).await?;
		let mut values = HashMap::with_capacity(detailed.len());
		for (key, outcome) in detailed {
			match outcome {
				Ok(lookup) => {
					values.insert(key, lookup.value);
				}
				Err(e) => warn!("Dropping key {} from result: {}", key.cache_key(), e),
			}
		}
		Ok(values)
	}

	/// Like [`KeyedAsyncCache::get_or_calculate`], but reports every key with
	/// its provenance or its individual error.
	pub async fn get_or_calculate_detailed<I>(
		&self,
		keys: I,
		timeout: Option<Duration>,
	) -> Result<HashMap<K, Result<Lookup<V>>>>
	where
		I: IntoIterator<Item = K>,
	{
		let keys: Vec<K> = keys.into_iter().collect();
		with_timeout(
			"cache.get_or_calculate",
			async move { Ok(self.resolve(keys).await) },
			timeout,
		)
		.await
	}

	async fn resolve(&self, keys: Vec<K>) -> HashMap<K, Result<Lookup<V>>> {
		let now = Instant::now();
		let usage = self.inner.policy.use_cached_value;
		let mut results = HashMap::with_capacity(keys.len());
		let mut waits = Vec::new();
		let mut dispatch = None;

		{
			let mut guard = self.inner.state.lock().await;
			let state = &mut *guard;
			let mut seen = HashSet::with_capacity(keys.len());

			for key in keys {
				let cache_key = key.cache_key();
				if !seen.insert(cache_key.clone()) {
					continue;
				}

				let cached = match usage {
					CachedValueUsage::Never => None,
					_ => state
						.entries
						.touch(&cache_key)
						.map(|entry| (entry.value.clone(), entry.is_fresh(now))),
				};

				match cached {
					Some((value, true)) => {
						let lookup = Lookup {
							value,
							freshness: Freshness::Fresh,
						};
						results.insert(key, Ok(lookup));
						continue;
					}
					Some((value, false)) if usage == CachedValueUsage::Always => {
						// Serve the stale value now and refresh it in the background.
						if !state.pending.contains_key(&cache_key) {
							Self::enqueue(state, key.clone(), cache_key, &mut dispatch);
						}
						let lookup = Lookup {
							value,
							freshness: Freshness::Stale,
						};
						results.insert(key, Ok(lookup));
						continue;
					}
					_ => {}
				}

				let (batch_id, outcome) = match state.pending.get(&cache_key) {
					Some((batch_id, in_flight)) => (*batch_id, in_flight.clone()),
					None => Self::enqueue(state, key.clone(), cache_key.clone(), &mut dispatch),
				};
				waits.push((key, cache_key, batch_id, outcome));
			}
		}

		if let Some(batch_id) = dispatch {
			self.spawn_dispatch(batch_id);
		}

		for (key, cache_key, batch_id, outcome) in waits {
			let resolved = match outcome.await {
				Some(Ok(values)) => match values.get(&key) {
					Some(value) => Ok(Lookup {
						value: value.clone(),
						freshness: Freshness::Computed,
					}),
					None => Err(AggregatorError::CacheComputation {
						key: cache_key.clone(),
						reason: "calculation returned no value".to_string(),
					}),
				},
				Some(Err(e)) => Err(AggregatorError::CacheComputation {
					key: cache_key.clone(),
					reason: e.to_string(),
				}),
				None => {
					self.release_abandoned(batch_id).await;
					Err(AggregatorError::CacheComputation {
						key: cache_key.clone(),
						reason: "batch computation was dropped".to_string(),
					})
				}
			};

			let resolved = match resolved {
				Ok(lookup) => Ok(lookup),
				Err(error) => self.fallback(&cache_key, error).await,
			};
			results.insert(key, resolved);
		}

		results
	}

	/// Adds `key` to the open batch, opening one if needed, and registers
	/// the batch as the key's in-flight computation.
	fn enqueue(
		state: &mut CacheState<K, V>,
		key: K,
		cache_key: CacheKey,
		dispatch: &mut Option<u64>,
	) -> (u64, SharedBatch<K, V>) {
		let (batch_id, outcome) = match state.open_batch.as_mut() {
			Some(batch) => {
				batch.keys.push(key);
				(batch.id, batch.outcome.clone())
			}
			None => {
				let id = state.next_batch_id;
				state.next_batch_id += 1;
				let batch = OpenBatch::new(id, key);
				let outcome = batch.outcome.clone();
				state.open_batch = Some(batch);
				*dispatch = Some(id);
				(id, outcome)
			}
		};
		state.pending.insert(cache_key, (batch_id, outcome.clone()));
		(batch_id, outcome)
	}

	/// Runs the batch `batch_id` on its own task once the current callers had
	/// a chance to join it.
	fn spawn_dispatch(&self, batch_id: u64) {
		let inner = self.inner.clone();
		tokio::spawn(async move {
			tokio::task::yield_now().await;

			let batch = {
				let mut state = inner.state.lock().await;
				match state.open_batch.take() {
					Some(batch) if batch.id == batch_id => batch,
					other => {
						state.open_batch = other;
						return;
					}
				}
			};

			debug!("Calculating batch {} with {} key(s)", batch.id, batch.keys.len());
			let calculation = inner.calculator.calculate(batch.keys.clone());
			let outcome = match AssertUnwindSafe(calculation).catch_unwind().await {
				Ok(Ok(values)) => Ok(Arc::new(values)),
				Ok(Err(e)) => {
					warn!("Batch {} calculation failed: {}", batch.id, e);
					Err(e)
				}
				Err(_) => Err(AggregatorError::Source(format!(
					"batch {} calculation panicked",
					batch.id
				))),
			};

			Self::settle(&inner, batch.id, &batch.keys, &outcome).await;
			// Nobody may be waiting any more; the entries are stored regardless.
			let _ = batch.sender.send(outcome);
		});
	}

	/// Stores a finished batch and clears its in-flight markers.
	///
	/// A TTL too large to represent as an instant never expires.
	async fn settle(
		inner: &CacheInner<K, V>,
		batch_id: u64,
		keys: &[K],
		outcome: &BatchOutcome<K, V>,
	) {
		let computed_at = Instant::now();
		let expires_at = computed_at.checked_add(inner.policy.ttl);
		let mut state = inner.state.lock().await;

		for key in keys {
			let cache_key = key.cache_key();
			if matches!(state.pending.get(&cache_key), Some((id, _)) if *id == batch_id) {
				state.pending.remove(&cache_key);
			}

			match outcome {
				Ok(values) => match values.get(key) {
					Some(value) => {
						let evicted = state.entries.insert(
							cache_key,
							value.clone(),
							computed_at,
							expires_at,
						);
						for evicted_key in evicted {
							debug!("Evicted least recently used entry {}", evicted_key);
						}
					}
					None => {
						let error = AggregatorError::CacheComputation {
							key: cache_key.clone(),
							reason: "calculation returned no value".to_string(),
						};
						state.entries.record_error(&cache_key, error);
					}
				},
				Err(e) => state.entries.record_error(&cache_key, e.clone()),
			}
		}
	}

	/// Forgets the in-flight markers of a batch whose task died before
	/// settling, so the next request for those keys computes them again.
	async fn release_abandoned(&self, batch_id: u64) {
		let mut state = self.inner.state.lock().await;
		let before = state.pending.len();
		state.pending.retain(|_, (id, _)| *id != batch_id);
		let released = before - state.pending.len();
		if released > 0 {
			warn!(
				"Batch {} ended without a result; released {} key(s)",
				batch_id, released
			);
		}
	}

	/// Previous value for a failed key, when the policy allows it.
	async fn fallback(&self, cache_key: &CacheKey, error: AggregatorError) -> Result<Lookup<V>> {
		if self.inner.policy.use_cached_value_if_calculation_failed == FailureFallback::Always {
			let state = self.inner.state.lock().await;
			if let Some(entry) = state.entries.peek(cache_key) {
				warn!("Serving previous value for {} after failure: {}", cache_key, error);
				return Ok(Lookup {
					value: entry.value.clone(),
					freshness: Freshness::Fallback,
				});
			}
		}
		Err(error)
	}

	/// Current entry for `key`, without computing or touching recency.
	pub async fn peek(&self, key: &K) -> Option<CacheEntry<V>> {
		let state = self.inner.state.lock().await;
		state.entries.peek(&key.cache_key()).cloned()
	}

	/// Drops the entry for `key`. In-flight computations are unaffected.
	pub async fn invalidate(&self, key: &K) -> bool {
		let mut state = self.inner.state.lock().await;
		state.entries.remove(&key.cache_key()).is_some()
	}

	pub async fn clear(&self) {
		self.inner.state.lock().await.entries.clear();
	}

	pub async fn len(&self) -> usize {
		self.inner.state.lock().await.entries.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use aggregator_core::wait_until;
	use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

	/// Records every batch handed to the calculation.
	#[derive(Clone, Default)]
	struct Recorder {
		batches: Arc<std::sync::Mutex<Vec<Vec<String>>>>,
	}

	impl Recorder {
		fn record(&self, keys: &[String]) {
			let mut sorted = keys.to_vec();
			sorted.sort();
			self.batches.lock().unwrap().push(sorted);
		}

		fn batches(&self) -> Vec<Vec<String>> {
			self.batches.lock().unwrap().clone()
		}

		fn times_computed(&self, key: &str) -> usize {
			self.batches()
				.iter()
				.filter(|batch| batch.iter().any(|k| k == key))
				.count()
		}
	}

	fn keys(names: &[&str]) -> Vec<String> {
		names.iter().map(|name| name.to_string()).collect()
	}

	/// Cache whose calculation returns the key length after `delay`.
	fn length_cache(
		recorder: Recorder,
		delay: Duration,
		policy: ExpirationPolicy,
	) -> KeyedAsyncCache<String, usize> {
		KeyedAsyncCache::new(
			move |batch: Vec<String>| {
				let recorder = recorder.clone();
				async move {
					recorder.record(&batch);
					tokio::time::sleep(delay).await;
					let values: HashMap<String, usize> =
						batch.into_iter().map(|k| (k.clone(), k.len())).collect();
					Ok::<_, AggregatorError>(values)
				}
			},
			policy,
		)
	}

	#[tokio::test]
	async fn test_concurrent_requests_share_computation_per_key() {
		let recorder = Recorder::default();
		let cache = length_cache(
			recorder.clone(),
			Duration::from_millis(20),
			ExpirationPolicy::default(),
		);

		let (first, second) = tokio::join!(
			cache.get_or_calculate(keys(&["a", "bb"]), None),
			cache.get_or_calculate(keys(&["bb", "ccc"]), None),
		);
		let first = first.unwrap();
		let second = second.unwrap();

		assert_eq!(first["a"], 1);
		assert_eq!(first["bb"], 2);
		assert_eq!(second["bb"], 2);
		assert_eq!(second["ccc"], 3);
		for key in ["a", "bb", "ccc"] {
			assert_eq!(recorder.times_computed(key), 1, "key {} computed twice", key);
		}
	}

	#[tokio::test]
	async fn test_concurrent_invocations_merge_into_one_batch() {
		let recorder = Recorder::default();
		let cache = length_cache(
			recorder.clone(),
			Duration::from_millis(5),
			ExpirationPolicy::default(),
		);

		let (first, second) = tokio::join!(
			cache.get_or_calculate(keys(&["a", "bb"]), None),
			cache.get_or_calculate(keys(&["ccc"]), None),
		);
		assert_eq!(first.unwrap().len(), 2);
		assert_eq!(second.unwrap().len(), 1);
		assert_eq!(recorder.batches(), vec![keys(&["a", "bb", "ccc"])]);
	}

	#[tokio::test]
	async fn test_fresh_entries_are_not_recomputed() {
		let recorder = Recorder::default();
		let cache = length_cache(recorder.clone(), Duration::ZERO, ExpirationPolicy::default());

		cache.get_or_calculate(keys(&["a"]), None).await.unwrap();
		let detailed = cache
			.get_or_calculate_detailed(keys(&["a", "a"]), None)
			.await
			.unwrap();

		assert_eq!(detailed.len(), 1);
		let lookup = detailed["a"].as_ref().unwrap();
		assert_eq!(lookup.freshness, Freshness::Fresh);
		assert_eq!(recorder.batches().len(), 1);
	}

	#[tokio::test]
	async fn test_unbounded_ttl_never_expires() {
		let recorder = Recorder::default();
		let policy = ExpirationPolicy::default().with_ttl(Duration::from_secs(u64::MAX));
		let cache = length_cache(recorder.clone(), Duration::ZERO, policy);

		for _ in 0..3 {
			let detailed = cache
				.get_or_calculate_detailed(keys(&["a"]), None)
				.await
				.unwrap();
			assert_eq!(detailed["a"].as_ref().unwrap().value, 1);
		}
		assert_eq!(recorder.times_computed("a"), 1);

		let entry = cache.peek(&"a".to_string()).await.unwrap();
		assert_eq!(entry.expires_at, None);
		assert!(entry.last_error.is_none());
	}

	#[tokio::test]
	async fn test_keys_of_a_vanished_batch_are_recomputed() {
		let recorder = Recorder::default();
		let cache = length_cache(recorder.clone(), Duration::ZERO, ExpirationPolicy::default());

		{
			// Register "ab" against a batch whose task is gone.
			let mut state = cache.inner.state.lock().await;
			let batch = OpenBatch::<String, usize>::new(99, "ab".to_string());
			let outcome = batch.outcome.clone();
			state.pending.insert("ab".to_string().cache_key(), (99, outcome));
		}

		let detailed = cache
			.get_or_calculate_detailed(keys(&["ab"]), None)
			.await
			.unwrap();
		let err = detailed["ab"].as_ref().unwrap_err();
		assert!(err.to_string().contains("dropped"));
		assert_eq!(recorder.times_computed("ab"), 0);

		let values = cache.get_or_calculate(keys(&["ab"]), None).await.unwrap();
		assert_eq!(values["ab"], 2);
		assert_eq!(recorder.times_computed("ab"), 1);
	}

	#[tokio::test]
	async fn test_never_policy_always_recomputes() {
		let recorder = Recorder::default();
		let policy =
			ExpirationPolicy::default().with_cached_value_usage(CachedValueUsage::Never);
		let cache = length_cache(recorder.clone(), Duration::ZERO, policy);

		cache.get_or_calculate(keys(&["a"]), None).await.unwrap();
		cache.get_or_calculate(keys(&["a"]), None).await.unwrap();
		assert_eq!(recorder.times_computed("a"), 2);
	}

	#[tokio::test]
	async fn test_previous_value_served_when_calculation_fails() {
		let fail = Arc::new(AtomicBool::new(false));
		let calls = Arc::new(AtomicU32::new(0));
		let policy = ExpirationPolicy::default()
			.with_ttl(Duration::from_millis(5))
			.with_failure_fallback(FailureFallback::Always);

		let cache: KeyedAsyncCache<String, u32> = {
			let fail = fail.clone();
			let calls = calls.clone();
			KeyedAsyncCache::new(
				move |batch: Vec<String>| {
					let fail = fail.load(Ordering::SeqCst);
					let call = calls.fetch_add(1, Ordering::SeqCst);
					async move {
						if fail {
							return Err(AggregatorError::Source("provider down".to_string()));
						}
						let values: HashMap<String, u32> =
							batch.into_iter().map(|k| (k, call)).collect();
						Ok(values)
					}
				},
				policy,
			)
		};

		let first = cache.get_or_calculate(keys(&["a"]), None).await.unwrap();
		assert_eq!(first["a"], 0);

		tokio::time::sleep(Duration::from_millis(15)).await;
		fail.store(true, Ordering::SeqCst);

		let detailed = cache
			.get_or_calculate_detailed(keys(&["a", "b"]), None)
			.await
			.unwrap();
		let a = detailed["a"].as_ref().unwrap();
		assert_eq!(a.value, 0);
		assert_eq!(a.freshness, Freshness::Fallback);
		assert!(matches!(
			detailed["b"],
			Err(AggregatorError::CacheComputation { .. })
		));

		let entry = cache.peek(&"a".to_string()).await.unwrap();
		assert!(entry.last_error.is_some());
	}

	#[tokio::test]
	async fn test_failure_without_fallback_fails_only_that_key() {
		let policy = ExpirationPolicy::default().with_failure_fallback(FailureFallback::Never);
		let cache: KeyedAsyncCache<String, usize> = KeyedAsyncCache::new(
			|batch: Vec<String>| async move {
				// "bad" never comes back from the provider.
				let values: HashMap<String, usize> = batch
					.into_iter()
					.filter(|k| k != "bad")
					.map(|k| (k.clone(), k.len()))
					.collect();
				Ok::<_, AggregatorError>(values)
			},
			policy,
		);

		let detailed = cache
			.get_or_calculate_detailed(keys(&["good", "bad", "ok"]), None)
			.await
			.unwrap();
		assert_eq!(detailed["good"].as_ref().unwrap().value, 4);
		assert_eq!(detailed["ok"].as_ref().unwrap().value, 2);
		match &detailed["bad"] {
			Err(AggregatorError::CacheComputation { key, .. }) => {
				assert_eq!(key, &"bad".to_string().cache_key());
			}
			other => panic!("expected computation error, got {:?}", other),
		}

		let values = cache
			.get_or_calculate(keys(&["good", "bad"]), None)
			.await
			.unwrap();
		assert_eq!(values.len(), 1);
		assert!(values.contains_key("good"));
	}

	#[tokio::test]
	async fn test_lru_eviction_with_max_size() {
		let recorder = Recorder::default();
		let policy = ExpirationPolicy::default().with_max_size(2);
		let cache = length_cache(recorder, Duration::ZERO, policy);

		cache.get_or_calculate(keys(&["a"]), None).await.unwrap();
		cache.get_or_calculate(keys(&["b"]), None).await.unwrap();
		cache.get_or_calculate(keys(&["c"]), None).await.unwrap();

		assert_eq!(cache.len().await, 2);
		assert!(cache.peek(&"a".to_string()).await.is_none());
		assert!(cache.peek(&"b".to_string()).await.is_some());
		assert!(cache.peek(&"c".to_string()).await.is_some());
	}

	#[tokio::test]
	async fn test_stale_value_served_and_refreshed_in_background() {
		let calls = Arc::new(AtomicU32::new(0));
		let policy = ExpirationPolicy::default()
			.with_ttl(Duration::from_millis(5))
			.with_cached_value_usage(CachedValueUsage::Always);
		let cache: KeyedAsyncCache<String, u32> = {
			let calls = calls.clone();
			KeyedAsyncCache::new(
				move |batch: Vec<String>| {
					let call = calls.fetch_add(1, Ordering::SeqCst);
					async move {
						let values: HashMap<String, u32> =
							batch.into_iter().map(|k| (k, call)).collect();
						Ok::<_, AggregatorError>(values)
					}
				},
				policy,
			)
		};

		cache.get_or_calculate(keys(&["a"]), None).await.unwrap();
		tokio::time::sleep(Duration::from_millis(15)).await;

		let detailed = cache
			.get_or_calculate_detailed(keys(&["a"]), None)
			.await
			.unwrap();
		let lookup = detailed["a"].as_ref().unwrap();
		assert_eq!(lookup.value, 0);
		assert_eq!(lookup.freshness, Freshness::Stale);

		let observer = cache.clone();
		wait_until(
			move || {
				let observer = observer.clone();
				async move {
					observer
						.peek(&"a".to_string())
						.await
						.map(|entry| entry.value == 1)
						.unwrap_or(false)
				}
			},
			Duration::from_millis(2),
			Some(50),
		)
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn test_timeout_does_not_cancel_computation() {
		let recorder = Recorder::default();
		let cache = length_cache(
			recorder.clone(),
			Duration::from_millis(30),
			ExpirationPolicy::default(),
		);

		let err = cache
			.get_or_calculate(keys(&["slow"]), Some(Duration::from_millis(2)))
			.await
			.unwrap_err();
		assert!(err.is_timeout());

		tokio::time::sleep(Duration::from_millis(60)).await;
		let entry = cache.peek(&"slow".to_string()).await.unwrap();
		assert_eq!(entry.value, 4);
		assert_eq!(recorder.times_computed("slow"), 1);
	}

	#[tokio::test]
	async fn test_invalidate_and_clear() {
		let recorder = Recorder::default();
		let cache = length_cache(recorder.clone(), Duration::ZERO, ExpirationPolicy::default());

		cache
			.get_or_calculate(keys(&["a", "b"]), None)
			.await
			.unwrap();
		assert_eq!(cache.len().await, 2);

		assert!(cache.invalidate(&"a".to_string()).await);
		assert!(!cache.invalidate(&"a".to_string()).await);
		cache.get_or_calculate(keys(&["a"]), None).await.unwrap();
		assert_eq!(recorder.times_computed("a"), 2);

		cache.clear().await;
		assert!(cache.is_empty().await);
	}
}
