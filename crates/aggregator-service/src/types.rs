//! Token metadata domain types.

use aggregator_types::{Address, AggregatorError, CacheKey, ChainId, IntoCacheKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata fields a source may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenField {
	Symbol,
	Name,
	Decimals,
	LogoUrl,
}

impl TokenField {
	pub const ALL: [TokenField; 4] = [
		TokenField::Symbol,
		TokenField::Name,
		TokenField::Decimals,
		TokenField::LogoUrl,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			TokenField::Symbol => "symbol",
			TokenField::Name => "name",
			TokenField::Decimals => "decimals",
			TokenField::LogoUrl => "logo_url",
		}
	}
}

impl fmt::Display for TokenField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TokenField {
	type Err = AggregatorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		TokenField::ALL
			.into_iter()
			.find(|field| field.as_str() == s)
			.ok_or_else(|| AggregatorError::Config(format!("Unknown token field: {}", s)))
	}
}

/// A token on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenKey {
	pub chain_id: ChainId,
	pub address: Address,
}

impl TokenKey {
	pub fn new(chain_id: ChainId, address: impl Into<Address>) -> Self {
		Self {
			chain_id,
			address: address.into(),
		}
	}
}

impl IntoCacheKey for TokenKey {
	fn cache_key(&self) -> CacheKey {
		CacheKey::from_fields([
			("chain", self.chain_id.to_string()),
			("address", self.address.to_string()),
		])
	}
}

impl fmt::Display for TokenKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.chain_id, self.address)
	}
}

/// Parses `<chain id>:<address>`.
impl FromStr for TokenKey {
	type Err = AggregatorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (chain, address) = s.split_once(':').ok_or_else(|| {
			AggregatorError::Config(format!("Expected <chain id>:<address>, got {}", s))
		})?;
		let chain_id = chain
			.parse::<ChainId>()
			.map_err(|e| AggregatorError::Config(format!("Invalid chain ID {}: {}", chain, e)))?;
		if address.trim().is_empty() {
			return Err(AggregatorError::Config(format!("Missing address in {}", s)));
		}
		Ok(Self::new(chain_id, address))
	}
}

/// Metadata for one token. Fields a source could not provide stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
	pub chain_id: ChainId,
	pub address: Address,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub symbol: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub decimals: Option<u8>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub logo_url: Option<String>,
	/// Name of the source that produced this record.
	pub source: String,
}

impl TokenMetadata {
	pub fn new(key: &TokenKey, source: impl Into<String>) -> Self {
		Self {
			chain_id: key.chain_id,
			address: key.address.clone(),
			symbol: None,
			name: None,
			decimals: None,
			logo_url: None,
			source: source.into(),
		}
	}

	pub fn key(&self) -> TokenKey {
		TokenKey::new(self.chain_id, self.address.clone())
	}

	pub fn has(&self, field: TokenField) -> bool {
		match field {
			TokenField::Symbol => self.symbol.is_some(),
			TokenField::Name => self.name.is_some(),
			TokenField::Decimals => self.decimals.is_some(),
			TokenField::LogoUrl => self.logo_url.is_some(),
		}
	}

	/// The subset of `fields` this record lacks.
	pub fn missing<'a, I>(&self, fields: I) -> Vec<TokenField>
	where
		I: IntoIterator<Item = &'a TokenField>,
	{
		let mut missing: Vec<TokenField> = fields
			.into_iter()
			.copied()
			.filter(|field| !self.has(*field))
			.collect();
		missing.sort();
		missing
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_key_parse_and_cache_key() {
		let key: TokenKey = "1:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".parse().unwrap();
		assert_eq!(key.chain_id, ChainId::ETHEREUM);
		assert_eq!(
			key.to_string(),
			"1:0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
		);

		let same = TokenKey::new(ChainId(1), "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
		assert_eq!(key.cache_key(), same.cache_key());

		let other_chain = TokenKey::new(ChainId(10), key.address.clone());
		assert_ne!(key.cache_key(), other_chain.cache_key());
	}

	#[test]
	fn test_token_field_names() {
		for field in TokenField::ALL {
			assert_eq!(field.as_str().parse::<TokenField>().unwrap(), field);
			assert_eq!(
				serde_json::to_value(field).unwrap(),
				serde_json::Value::String(field.to_string())
			);
		}
		assert!("price".parse::<TokenField>().is_err());
	}

	#[test]
	fn test_token_key_parse_errors() {
		assert!("0xabc".parse::<TokenKey>().is_err());
		assert!("mainnet:0xabc".parse::<TokenKey>().is_err());
		assert!("1:".parse::<TokenKey>().is_err());
	}

	#[test]
	fn test_missing_fields() {
		let key = TokenKey::new(ChainId(1), "0xabc");
		let mut metadata = TokenMetadata::new(&key, "test");
		metadata.symbol = Some("USDC".to_string());

		assert!(metadata.has(TokenField::Symbol));
		assert_eq!(
			metadata.missing(&[TokenField::Decimals, TokenField::Symbol, TokenField::Name]),
			vec![TokenField::Name, TokenField::Decimals]
		);
		assert_eq!(metadata.key(), key);
	}

	#[test]
	fn test_metadata_serialization_skips_absent_fields() {
		let key = TokenKey::new(ChainId(1), "0xabc");
		let mut metadata = TokenMetadata::new(&key, "test");
		metadata.decimals = Some(6);

		let json = serde_json::to_value(&metadata).unwrap();
		assert_eq!(json["decimals"], 6);
		assert!(json.get("symbol").is_none());
		assert_eq!(json["chain_id"], 1);
	}
}
