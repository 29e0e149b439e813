//! Token source backed by per-chain RPC routers.

use crate::source::TokenSource;
use crate::types::{TokenField, TokenMetadata};
use aggregator_transport::RouterRegistry;
use aggregator_types::{
	Address, ChainId, FieldRequirement, FieldSupport, Result, SupportRecord,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// JSON-RPC method answered by metadata-capable nodes.
pub const TOKEN_METADATA_METHOD: &str = "aggregator_tokenMetadata";

#[derive(Debug, Deserialize)]
struct RemoteToken {
	address: Address,
	#[serde(default)]
	symbol: Option<String>,
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	decimals: Option<u8>,
	#[serde(default)]
	logo_url: Option<String>,
}

/// Fetches metadata with `aggregator_tokenMetadata` calls routed across each
/// chain's redundant endpoints.
pub struct RouterTokenSource {
	name: String,
	routers: Arc<RouterRegistry>,
	support: SupportRecord<TokenField>,
}

impl RouterTokenSource {
	pub fn new(name: impl Into<String>, routers: Arc<RouterRegistry>) -> Self {
		Self {
			name: name.into(),
			routers,
			support: HashMap::from([
				(TokenField::Symbol, FieldSupport::Present),
				(TokenField::Decimals, FieldSupport::Present),
				(TokenField::Name, FieldSupport::Optional),
				(TokenField::LogoUrl, FieldSupport::Optional),
			]),
		}
	}

	pub fn with_support(mut self, support: SupportRecord<TokenField>) -> Self {
		self.support = support;
		self
	}
}

#[async_trait]
impl TokenSource for RouterTokenSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn support(&self) -> SupportRecord<TokenField> {
		self.support.clone()
	}

	fn chains(&self) -> Vec<ChainId> {
		self.routers.chains()
	}

	async fn fetch(
		&self,
		chain_id: ChainId,
		addresses: &[Address],
		fields: &HashMap<TokenField, FieldRequirement>,
	) -> Result<HashMap<Address, TokenMetadata>> {
		let router = self.routers.get_required(&chain_id)?;

		let mut requested: Vec<TokenField> = fields
			.iter()
			.filter(|(_, level)| **level != FieldRequirement::CanIgnore)
			.map(|(field, _)| *field)
			.collect();
		requested.sort();

		let params = json!({
			"chain_id": chain_id.0,
			"addresses": addresses,
			"fields": requested,
		});
		let response = router.request(TOKEN_METADATA_METHOD, params).await?;
		let tokens: Vec<RemoteToken> = serde_json::from_value(response)?;
		debug!(
			"{} returned {} of {} token(s) on chain {}",
			self.name,
			tokens.len(),
			addresses.len(),
			chain_id
		);

		Ok(tokens
			.into_iter()
			.map(|token| {
				let metadata = TokenMetadata {
					chain_id,
					address: token.address.clone(),
					symbol: token.symbol,
					name: token.name,
					decimals: token.decimals,
					logo_url: token.logo_url,
					source: self.name.clone(),
				};
				(token.address, metadata)
			})
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::service::TokenMetadataService;
	use crate::source::SourceRegistry;
	use crate::types::TokenKey;
	use aggregator_transport::AdaptiveTransportRouter;
	use aggregator_types::{
		AggregatorError, ExpirationPolicy, FieldRequirements, RouterConfig, Transport,
	};
	use serde_json::Value;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Mutex;

	/// Answers `aggregator_tokenMetadata` from a fixed table.
	struct NodeStub {
		name: &'static str,
		healthy: bool,
		calls: AtomicU32,
		last_params: Mutex<Option<Value>>,
	}

	impl NodeStub {
		fn new(name: &'static str, healthy: bool) -> Arc<Self> {
			Arc::new(Self {
				name,
				healthy,
				calls: AtomicU32::new(0),
				last_params: Mutex::new(None),
			})
		}
	}

	#[async_trait]
	impl Transport for NodeStub {
		fn name(&self) -> &str {
			self.name
		}

		async fn request(&self, method: &str, params: Value) -> Result<Value> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			*self.last_params.lock().unwrap() = Some(params.clone());
			if !self.healthy {
				return Err(AggregatorError::Transport(format!("{} refused", self.name)));
			}
			assert_eq!(method, TOKEN_METADATA_METHOD);

			let tokens: Vec<Value> = params["addresses"]
				.as_array()
				.cloned()
				.unwrap_or_default()
				.into_iter()
				.filter(|address| address != "0xunknown")
				.map(|address| {
					json!({
						"address": address,
						"symbol": "USDC",
						"decimals": 6,
					})
				})
				.collect();
			Ok(Value::Array(tokens))
		}
	}

	fn routers(nodes: &[Arc<NodeStub>]) -> Arc<RouterRegistry> {
		let transports = nodes
			.iter()
			.map(|node| node.clone() as Arc<dyn Transport>)
			.collect();
		let mut registry = RouterRegistry::new();
		registry
			.register(
				ChainId::ETHEREUM,
				Arc::new(AdaptiveTransportRouter::new(
					transports,
					RouterConfig::default(),
				)),
			)
			.unwrap();
		Arc::new(registry)
	}

	#[tokio::test]
	async fn test_fetch_sends_requested_fields() {
		let node = NodeStub::new("node-a", true);
		let source = RouterTokenSource::new("rpc", routers(&[node.clone()]));
		let fields = HashMap::from([
			(TokenField::Symbol, FieldRequirement::Required),
			(TokenField::Decimals, FieldRequirement::Required),
			(TokenField::LogoUrl, FieldRequirement::CanIgnore),
		]);

		let tokens = source
			.fetch(
				ChainId::ETHEREUM,
				&[Address::new("0xaa"), Address::new("0xunknown")],
				&fields,
			)
			.await
			.unwrap();

		assert_eq!(tokens.len(), 1);
		let token = &tokens[&Address::new("0xaa")];
		assert_eq!(token.symbol.as_deref(), Some("USDC"));
		assert_eq!(token.decimals, Some(6));
		assert_eq!(token.source, "rpc");

		let params = node.last_params.lock().unwrap().clone().unwrap();
		assert_eq!(params["chain_id"], 1);
		assert_eq!(params["fields"], json!(["symbol", "decimals"]));
	}

	#[tokio::test]
	async fn test_unknown_chain_fails() {
		let source = RouterTokenSource::new("rpc", routers(&[NodeStub::new("node-a", true)]));
		assert_eq!(source.chains(), vec![ChainId::ETHEREUM]);

		let result = source
			.fetch(ChainId::OPTIMISM, &[Address::new("0xaa")], &HashMap::new())
			.await;
		assert!(result.is_err());
	}

	#[tokio::test]
	async fn test_service_routes_around_failed_node() {
		let down = NodeStub::new("node-down", false);
		let up = NodeStub::new("node-up", true);
		let routers = routers(&[down.clone(), up.clone()]);

		let mut sources = SourceRegistry::new();
		sources
			.register(Arc::new(RouterTokenSource::new("rpc", routers.clone())))
			.unwrap();
		let service = TokenMetadataService::new(
			Arc::new(sources),
			FieldRequirements::default(),
			ExpirationPolicy::default(),
			None,
		);

		let result = service
			.get_metadata([
				TokenKey::new(ChainId::ETHEREUM, "0xaa"),
				TokenKey::new(ChainId::ETHEREUM, "0xbb"),
			])
			.await
			.unwrap();
		assert_eq!(result.len(), 2);
		assert_eq!(down.calls.load(Ordering::SeqCst), 1);
		assert_eq!(up.calls.load(Ordering::SeqCst), 1);

		let router = routers.get(&ChainId::ETHEREUM).unwrap();
		assert_eq!(router.metrics(0, TOKEN_METADATA_METHOD).success_rate, 0.0);
		assert_eq!(router.metrics(1, TOKEN_METADATA_METHOD).success_rate, 1.0);
	}
}
