//! Common types used throughout the aggregator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
	pub const ETHEREUM: Self = Self(1);
	pub const ARBITRUM: Self = Self(42161);
	pub const OPTIMISM: Self = Self(10);
	pub const POLYGON: Self = Self(137);
	pub const BASE: Self = Self(8453);
}

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ChainId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(ChainId(s.parse()?))
	}
}

/// Account or contract address.
///
/// Stored lowercase so that checksummed and non-checksummed spellings of the
/// same address compare equal and produce the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
	pub fn new(value: impl AsRef<str>) -> Self {
		Self(value.as_ref().trim().to_ascii_lowercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for Address {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for Address {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<Address> for String {
	fn from(value: Address) -> Self {
		value.0
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Opaque, deterministic cache identifier.
///
/// Built from named fields; the fields are sorted by name before encoding, so
/// the order in which they are supplied never changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
	/// Builds a key from `(field, value)` pairs.
	pub fn from_fields<I, N, V>(fields: I) -> Self
	where
		I: IntoIterator<Item = (N, V)>,
		N: Into<String>,
		V: Into<String>,
	{
		let sorted: BTreeMap<String, String> = fields
			.into_iter()
			.map(|(name, value)| (name.into(), value.into()))
			.collect();
		// A map of strings always serializes.
		let encoded = serde_json::to_string(&sorted).unwrap_or_default();
		Self(encoded)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Types that can be stored in a keyed cache.
pub trait IntoCacheKey {
	fn cache_key(&self) -> CacheKey;
}

impl IntoCacheKey for CacheKey {
	fn cache_key(&self) -> CacheKey {
		self.clone()
	}
}

impl IntoCacheKey for String {
	fn cache_key(&self) -> CacheKey {
		CacheKey::from_fields([("id", self.as_str())])
	}
}

impl IntoCacheKey for ChainId {
	fn cache_key(&self) -> CacheKey {
		CacheKey::from_fields([("chain", self.0.to_string())])
	}
}
