//! Per-chain router registry.
//!
//! Every chain gets its own [`AdaptiveTransportRouter`] so statistics for one
//! chain's endpoints never influence another chain's ranking.

use crate::implementations::http::HttpTransport;
use crate::router::AdaptiveTransportRouter;
use aggregator_types::{AggregatorError, ChainId, Result, RouterConfig, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Routers indexed by chain ID.
#[derive(Default)]
pub struct RouterRegistry {
	routers: HashMap<ChainId, Arc<AdaptiveTransportRouter>>,
}

impl RouterRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers the router for a chain.
	///
	/// # Errors
	///
	/// Returns `AggregatorError::Config` if the chain already has a router.
	pub fn register(&mut self, chain_id: ChainId, router: Arc<AdaptiveTransportRouter>) -> Result<()> {
		info!(
			"Registering router for chain {} with {} transport(s)",
			chain_id,
			router.transport_count()
		);

		if self.routers.contains_key(&chain_id) {
			return Err(AggregatorError::Config(format!(
				"Chain {} already registered",
				chain_id
			)));
		}

		self.routers.insert(chain_id, router);
		Ok(())
	}

	pub fn get(&self, chain_id: &ChainId) -> Option<Arc<AdaptiveTransportRouter>> {
		self.routers.get(chain_id).cloned()
	}

	/// Like [`RouterRegistry::get`], but a missing chain is an error.
	pub fn get_required(&self, chain_id: &ChainId) -> Result<Arc<AdaptiveTransportRouter>> {
		self.get(chain_id).ok_or_else(|| {
			AggregatorError::Transport(format!("Chain {} not configured", chain_id))
		})
	}

	/// Registered chains in ascending order.
	pub fn chains(&self) -> Vec<ChainId> {
		let mut chains: Vec<ChainId> = self.routers.keys().copied().collect();
		chains.sort();
		chains
	}

	/// Builds one HTTP-backed router per chain.
	///
	/// Endpoint order is registration order, so the first URL is preferred
	/// until statistics say otherwise.
	pub fn from_endpoints(
		endpoints: HashMap<ChainId, Vec<String>>,
		config: RouterConfig,
		request_timeout: Duration,
	) -> Result<Self> {
		let mut registry = Self::new();

		for (chain_id, urls) in endpoints {
			if urls.is_empty() {
				return Err(AggregatorError::Config(format!(
					"Chain {} has no RPC endpoints",
					chain_id
				)));
			}

			let mut transports: Vec<Arc<dyn Transport>> = Vec::with_capacity(urls.len());
			for (position, url) in urls.into_iter().enumerate() {
				debug!("Adding endpoint {} for chain {} at {}", position, chain_id, url);
				let transport = HttpTransport::new(url, request_timeout)?
					.with_name(format!("chain-{}-rpc-{}", chain_id, position));
				transports.push(Arc::new(transport));
			}

			let router = AdaptiveTransportRouter::new(transports, config.clone());
			registry.register(chain_id, Arc::new(router))?;
		}

		Ok(registry)
	}
}
