//! JSON-RPC 2.0 over HTTP.

use aggregator_types::{AggregatorError, Result, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
	jsonrpc: &'static str,
	id: u64,
	method: &'a str,
	params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
	code: i64,
	message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<RpcErrorObject>,
}

/// A single JSON-RPC endpoint.
pub struct HttpTransport {
	name: String,
	url: String,
	client: reqwest::Client,
	next_id: AtomicU64,
}

impl HttpTransport {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
		let url = url.into();
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| {
				AggregatorError::Transport(format!("Failed to create HTTP client: {}", e))
			})?;

		Ok(Self {
			name: url.clone(),
			url,
			client,
			next_id: AtomicU64::new(1),
		})
	}

	/// Overrides the label used in logs.
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn url(&self) -> &str {
		&self.url
	}
}

#[async_trait]
impl Transport for HttpTransport {
	fn name(&self) -> &str {
		&self.name
	}

	async fn request(&self, method: &str, params: Value) -> Result<Value> {
		let body = RpcRequest {
			jsonrpc: "2.0",
			id: self.next_id.fetch_add(1, Ordering::Relaxed),
			method,
			params,
		};

		let response = self
			.client
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|e| AggregatorError::Transport(format!("HTTP request failed: {}", e)))?;

		if !response.status().is_success() {
			return Err(AggregatorError::Transport(format!(
				"HTTP request failed with status: {}",
				response.status()
			)));
		}

		let response: RpcResponse = response.json().await.map_err(|e| {
			AggregatorError::Transport(format!("Failed to parse JSON-RPC response: {}", e))
		})?;

		if let Some(error) = response.error {
			return Err(AggregatorError::Transport(format!(
				"RPC error {}: {}",
				error.code, error.message
			)));
		}

		Ok(response.result.unwrap_or(Value::Null))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, method};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[tokio::test]
	async fn test_returns_result_field() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(body_partial_json(json!({ "jsonrpc": "2.0", "method": "eth_chainId" })))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x1" })),
			)
			.mount(&server)
			.await;

		let transport = HttpTransport::new(server.uri(), DEFAULT_REQUEST_TIMEOUT).unwrap();
		let value = transport.request("eth_chainId", json!([])).await.unwrap();
		assert_eq!(value, json!("0x1"));
		assert_eq!(transport.name(), server.uri());
	}

	#[tokio::test]
	async fn test_maps_rpc_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"jsonrpc": "2.0",
				"id": 1,
				"error": { "code": -32601, "message": "method not found" }
			})))
			.mount(&server)
			.await;

		let transport = HttpTransport::new(server.uri(), DEFAULT_REQUEST_TIMEOUT)
			.unwrap()
			.with_name("primary");
		let err = transport.request("eth_foo", json!([])).await.unwrap_err();
		assert_eq!(
			err,
			AggregatorError::Transport("RPC error -32601: method not found".to_string())
		);
		assert_eq!(transport.name(), "primary");
	}

	#[tokio::test]
	async fn test_maps_http_status() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(503))
			.mount(&server)
			.await;

		let transport = HttpTransport::new(server.uri(), DEFAULT_REQUEST_TIMEOUT).unwrap();
		let err = transport.request("eth_call", json!([])).await.unwrap_err();
		assert!(err.to_string().contains("503"));
	}

	#[tokio::test]
	async fn test_request_timeout_is_a_transport_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({ "result": null }))
					.set_delay(Duration::from_millis(500)),
			)
			.mount(&server)
			.await;

		let transport = HttpTransport::new(server.uri(), Duration::from_millis(20)).unwrap();
		let err = transport.request("eth_call", json!([])).await.unwrap_err();
		assert!(matches!(err, AggregatorError::Transport(_)));
	}
}
