//! Serde helpers for configuration deserialization

use aggregator_types::ChainId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Deserializes a `HashMap<ChainId, T>` whose keys are written as strings.
///
/// TOML and JSON only allow string keys, so `[chains.1]` arrives as `"1"`.
pub fn deserialize_chain_id_map<'de, D, T>(
	deserializer: D,
) -> Result<HashMap<ChainId, T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	let map = HashMap::<String, T>::deserialize(deserializer)?;

	map.into_iter()
		.map(|(k, v)| {
			k.parse::<ChainId>()
				.map(|id| (id, v))
				.map_err(|_| serde::de::Error::custom(format!("Invalid chain ID: {}", k)))
		})
		.collect()
}

/// Serializes a `HashMap<ChainId, T>` with string keys.
pub fn serialize_chain_id_map<S, T>(
	map: &HashMap<ChainId, T>,
	serializer: S,
) -> Result<S::Ok, S::Error>
where
	S: Serializer,
	T: Serialize,
{
	let string_map: HashMap<String, &T> = map.iter().map(|(k, v)| (k.to_string(), v)).collect();

	string_map.serialize(serializer)
}
