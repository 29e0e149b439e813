//! Field capability and requirement levels.
//!
//! Sources declare which fields they can deliver through a [`SupportRecord`];
//! callers declare how much they care about each field through
//! [`FieldRequirements`]. The negotiation between the two lives in
//! `aggregator-core`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// How reliably a source delivers a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSupport {
	/// Always delivered.
	Present,
	/// Delivered when the upstream happens to have it.
	Optional,
}

/// How much a caller depends on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRequirement {
	/// Results lacking the field are unusable.
	Required,
	/// Request the field but accept results without it.
	BestEffort,
	/// Do not bother requesting the field.
	CanIgnore,
}

/// Field support declared by a source. Fields absent from the map are not
/// supported at all.
pub type SupportRecord<F> = HashMap<F, FieldSupport>;

/// Caller-declared importance per field, with an optional fallback level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
	serialize = "F: Serialize + Eq + Hash",
	deserialize = "F: Deserialize<'de> + Eq + Hash"
))]
pub struct FieldRequirements<F> {
	#[serde(default)]
	pub specific: HashMap<F, FieldRequirement>,
	#[serde(default)]
	pub default: Option<FieldRequirement>,
}

impl<F: Eq + Hash> PartialEq for FieldRequirements<F> {
	fn eq(&self, other: &Self) -> bool {
		self.specific == other.specific && self.default == other.default
	}
}

impl<F: Eq + Hash> Eq for FieldRequirements<F> {}

impl<F: Eq + Hash> Default for FieldRequirements<F> {
	fn default() -> Self {
		Self {
			specific: HashMap::new(),
			default: None,
		}
	}
}

impl<F: Eq + Hash> FieldRequirements<F> {
	/// Applies one level to every field not listed explicitly.
	pub fn with_default(level: FieldRequirement) -> Self {
		Self {
			specific: HashMap::new(),
			default: Some(level),
		}
	}

	pub fn with_field(mut self, field: F, level: FieldRequirement) -> Self {
		self.specific.insert(field, level);
		self
	}

	/// Level requested for `field`, if the caller said anything about it.
	pub fn level_for(&self, field: &F) -> Option<FieldRequirement> {
		self.specific.get(field).copied().or(self.default)
	}
}
