//! Cached, multi-source token metadata lookups.
//!
//! A lookup goes through three layers: the cache answers what it can and
//! batches the rest, the batch is split by chain, and each chain group is
//! fetched from the highest-priority source that can serve it. A chain whose
//! sources all fail is dropped from the result instead of failing the lookup.

use crate::source::SourceRegistry;
use crate::types::{TokenField, TokenKey, TokenMetadata};
use aggregator_cache::KeyedAsyncCache;
use aggregator_core::{
	calculate_field_requirements, ensure_supported, mandatory_fields, TimeoutGuard,
};
use aggregator_types::{
	Address, AggregatorError, ChainId, ExpirationPolicy, FieldRequirement, FieldRequirements,
	Result,
};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Token metadata aggregated over every registered source.
pub struct TokenMetadataService {
	registry: Arc<SourceRegistry>,
	requirements: Arc<FieldRequirements<TokenField>>,
	cache: KeyedAsyncCache<TokenKey, TokenMetadata>,
	timeout: TimeoutGuard,
}

impl TokenMetadataService {
	/// `timeout` bounds every lookup as a whole; `None` waits indefinitely.
	pub fn new(
		registry: Arc<SourceRegistry>,
		requirements: FieldRequirements<TokenField>,
		policy: ExpirationPolicy,
		timeout: Option<Duration>,
	) -> Self {
		let requirements = Arc::new(requirements);
		let calculator = {
			let registry = registry.clone();
			let requirements = requirements.clone();
			move |keys: Vec<TokenKey>| {
				let registry = registry.clone();
				let requirements = requirements.clone();
				async move { fetch_batch(&registry, &requirements, keys).await }
			}
		};

		info!(
			"Token metadata service ready with {} source(s)",
			registry.len()
		);
		Self {
			registry,
			requirements,
			cache: KeyedAsyncCache::new(calculator, policy),
			timeout: TimeoutGuard::new(timeout),
		}
	}

	/// Metadata for every token that could be resolved. Tokens that failed
	/// are left out.
	pub async fn get_metadata<I>(&self, tokens: I) -> Result<HashMap<TokenKey, TokenMetadata>>
	where
		I: IntoIterator<Item = TokenKey>,
	{
		let tokens: Vec<TokenKey> = tokens.into_iter().collect();
		debug!("Looking up metadata for {} token(s)", tokens.len());

		self.timeout
			.run(
				"token_metadata.get_metadata",
				self.cache.get_or_calculate(tokens, None),
			)
			.await
	}

	/// Metadata for tokens on one chain, ordered by address.
	pub async fn get_chain_metadata(
		&self,
		chain_id: ChainId,
		addresses: &[Address],
	) -> Result<Vec<TokenMetadata>> {
		let keys = addresses
			.iter()
			.map(|address| TokenKey::new(chain_id, address.clone()));
		let mut tokens: Vec<TokenMetadata> =
			self.get_metadata(keys).await?.into_values().collect();
		tokens.sort_by(|a, b| a.address.cmp(&b.address));
		Ok(tokens)
	}

	/// The field levels this service would ask `source_name` for.
	pub fn negotiate(&self, source_name: &str) -> Result<HashMap<TokenField, FieldRequirement>> {
		let source = self.registry.get(source_name).ok_or_else(|| {
			AggregatorError::Config(format!("Unknown source {}", source_name))
		})?;
		Ok(calculate_field_requirements(
			&source.support(),
			Some(self.requirements.as_ref()),
		))
	}

	/// Names of the sources that list every field in `fields`.
	pub fn sources_supporting(&self, fields: &[TokenField]) -> Vec<String> {
		self.registry
			.names()
			.into_iter()
			.filter_map(|name| {
				let source = self.registry.get(name)?;
				match ensure_supported(name, &source.support(), fields) {
					Ok(()) => Some(name.to_string()),
					Err(e) => {
						debug!("{}", e);
						None
					}
				}
			})
			.collect()
	}

	/// Forgets a token so the next lookup fetches it again.
	pub async fn invalidate(&self, key: &TokenKey) -> bool {
		self.cache.invalidate(key).await
	}

	pub fn cache(&self) -> &KeyedAsyncCache<TokenKey, TokenMetadata> {
		&self.cache
	}
}

/// Cache calculation: one fetch per chain, run concurrently.
async fn fetch_batch(
	registry: &SourceRegistry,
	requirements: &FieldRequirements<TokenField>,
	keys: Vec<TokenKey>,
) -> Result<HashMap<TokenKey, TokenMetadata>> {
	let mut groups: BTreeMap<ChainId, Vec<Address>> = BTreeMap::new();
	for key in keys {
		groups.entry(key.chain_id).or_default().push(key.address);
	}

	let fetches = groups.into_iter().map(|(chain_id, addresses)| async move {
		let outcome = fetch_chain(registry, requirements, chain_id, &addresses).await;
		(chain_id, outcome)
	});

	let mut values = HashMap::new();
	for (chain_id, outcome) in join_all(fetches).await {
		match outcome {
			Ok(tokens) => {
				values.extend(tokens.into_iter().map(|token| (token.key(), token)));
			}
			Err(e) => warn!("Dropping chain {} from result: {}", chain_id, e),
		}
	}
	Ok(values)
}

/// Walks the chain's sources in priority order. Each source is asked only
/// for tokens no earlier source delivered with all mandatory fields.
async fn fetch_chain(
	registry: &SourceRegistry,
	requirements: &FieldRequirements<TokenField>,
	chain_id: ChainId,
	addresses: &[Address],
) -> Result<Vec<TokenMetadata>> {
	let sources = registry.for_chain(chain_id);
	if sources.is_empty() {
		return Err(AggregatorError::Source(format!(
			"No source serves chain {}",
			chain_id
		)));
	}

	let mut remaining: Vec<Address> = addresses.to_vec();
	let mut found = Vec::with_capacity(remaining.len());
	let mut last_error = None;

	for source in sources {
		if remaining.is_empty() {
			break;
		}

		let fields = calculate_field_requirements(&source.support(), Some(requirements));
		let mandatory = mandatory_fields(&fields);

		match source.fetch(chain_id, &remaining, &fields).await {
			Ok(mut fetched) => {
				remaining.retain(|address| {
					let Some(mut token) = fetched.remove(address) else {
						return true;
					};
					let missing = token.missing(&mandatory);
					if !missing.is_empty() {
						debug!(
							"{} returned {} on chain {} without {:?}",
							source.name(),
							address,
							chain_id,
							missing
						);
						return true;
					}
					token.chain_id = chain_id;
					token.address = address.clone();
					found.push(token);
					false
				});
			}
			Err(e) => {
				warn!(
					"Source {} failed for chain {}: {}",
					source.name(),
					chain_id,
					e
				);
				last_error = Some(e);
			}
		}
	}

	if found.is_empty() {
		if let Some(e) = last_error {
			return Err(e);
		}
	}
	if !remaining.is_empty() {
		debug!(
			"{} token(s) on chain {} unresolved by any source",
			remaining.len(),
			chain_id
		);
	}
	Ok(found)
}
