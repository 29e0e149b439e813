//! Token metadata sources and their registry.

use crate::types::{TokenField, TokenMetadata};
use aggregator_types::{Address, AggregatorError, ChainId, FieldRequirement, Result, SupportRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// A provider of token metadata, such as a token list API or an RPC node.
#[async_trait]
pub trait TokenSource: Send + Sync {
	/// Unique name, used in logs and as the `source` of produced records.
	fn name(&self) -> &str;

	/// Which fields this source always provides and which it sometimes does.
	fn support(&self) -> SupportRecord<TokenField>;

	/// Chains this source can answer for.
	fn chains(&self) -> Vec<ChainId>;

	fn supports_chain(&self, chain_id: ChainId) -> bool {
		self.chains().contains(&chain_id)
	}

	/// Fetches metadata for `addresses` on one chain.
	///
	/// `fields` carries the negotiated level for each field the source
	/// supports. Addresses the source knows nothing about are left out of the
	/// returned map.
	async fn fetch(
		&self,
		chain_id: ChainId,
		addresses: &[Address],
		fields: &HashMap<TokenField, FieldRequirement>,
	) -> Result<HashMap<Address, TokenMetadata>>;
}

/// Registered sources in priority order.
#[derive(Default)]
pub struct SourceRegistry {
	sources: Vec<Arc<dyn TokenSource>>,
}

impl SourceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a source with the lowest priority so far.
	///
	/// # Errors
	///
	/// Returns `AggregatorError::Config` if a source with the same name is
	/// already registered.
	pub fn register(&mut self, source: Arc<dyn TokenSource>) -> Result<()> {
		if self.get(source.name()).is_some() {
			return Err(AggregatorError::Config(format!(
				"Source {} already registered",
				source.name()
			)));
		}

		info!(
			"Registering token source {} for {} chain(s)",
			source.name(),
			source.chains().len()
		);
		self.sources.push(source);
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn TokenSource>> {
		self.sources
			.iter()
			.find(|source| source.name() == name)
			.cloned()
	}

	/// Sources serving `chain_id`, highest priority first.
	pub fn for_chain(&self, chain_id: ChainId) -> Vec<Arc<dyn TokenSource>> {
		self.sources
			.iter()
			.filter(|source| source.supports_chain(chain_id))
			.cloned()
			.collect()
	}

	pub fn names(&self) -> Vec<&str> {
		self.sources.iter().map(|source| source.name()).collect()
	}

	pub fn len(&self) -> usize {
		self.sources.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sources.is_empty()
	}
}
