//! Cache entries and the bounded entry table.

use aggregator_types::{AggregatorError, CacheKey};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// A computed value together with its freshness window.
///
/// Entries are replaced wholesale on recomputation; only `last_error` and the
/// recency tick change in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
	pub value: V,
	pub computed_at: Instant,
	/// `None` when the entry never expires.
	pub expires_at: Option<Instant>,
	/// Most recent failed recomputation, if the value is older than it.
	pub last_error: Option<AggregatorError>,
	last_access: u64,
}

impl<V> CacheEntry<V> {
	pub fn is_fresh(&self, now: Instant) -> bool {
		self.expires_at.map_or(true, |expires_at| now < expires_at)
	}
}

/// Entry table with least-recently-used eviction.
///
/// `recency` maps each entry's last access tick to its key, so the least
/// recently used entry is always the first one.
#[derive(Debug)]
pub(crate) struct EntryTable<V> {
	entries: HashMap<CacheKey, CacheEntry<V>>,
	recency: BTreeMap<u64, CacheKey>,
	max_size: Option<usize>,
	tick: u64,
}

impl<V> EntryTable<V> {
	pub(crate) fn new(max_size: Option<usize>) -> Self {
		Self {
			entries: HashMap::new(),
			recency: BTreeMap::new(),
			max_size,
			tick: 0,
		}
	}

	fn next_tick(&mut self) -> u64 {
		self.tick += 1;
		self.tick
	}

	/// Looks up an entry and marks it as most recently used.
	pub(crate) fn touch(&mut self, key: &CacheKey) -> Option<&CacheEntry<V>> {
		if !self.entries.contains_key(key) {
			return None;
		}
		let tick = self.next_tick();
		let entry = self.entries.get_mut(key)?;
		self.recency.remove(&entry.last_access);
		self.recency.insert(tick, key.clone());
		entry.last_access = tick;
		Some(entry)
	}

	/// Looks up an entry without changing its recency.
	pub(crate) fn peek(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
		self.entries.get(key)
	}

	/// Stores a freshly computed value, evicting the least recently used
	/// entries if the table grows past its bound. Returns evicted keys.
	pub(crate) fn insert(
		&mut self,
		key: CacheKey,
		value: V,
		computed_at: Instant,
		expires_at: Option<Instant>,
	) -> Vec<CacheKey> {
		let last_access = self.next_tick();
		self.recency.insert(last_access, key.clone());
		let replaced = self.entries.insert(
			key,
			CacheEntry {
				value,
				computed_at,
				expires_at,
				last_error: None,
				last_access,
			},
		);
		if let Some(replaced) = replaced {
			self.recency.remove(&replaced.last_access);
		}
		self.evict_overflow()
	}

	pub(crate) fn record_error(&mut self, key: &CacheKey, error: AggregatorError) {
		if let Some(entry) = self.entries.get_mut(key) {
			entry.last_error = Some(error);
		}
	}

	pub(crate) fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
		let entry = self.entries.remove(key)?;
		self.recency.remove(&entry.last_access);
		Some(entry)
	}

	pub(crate) fn clear(&mut self) {
		self.entries.clear();
		self.recency.clear();
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	fn evict_overflow(&mut self) -> Vec<CacheKey> {
		let Some(max_size) = self.max_size else {
			return Vec::new();
		};

		let mut evicted = Vec::new();
		while self.entries.len() > max_size {
			let Some((_, key)) = self.recency.pop_first() else {
				break;
			};
			self.entries.remove(&key);
			evicted.push(key);
		}
		evicted
	}
}
