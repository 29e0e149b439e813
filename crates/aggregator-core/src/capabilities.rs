//! Capability negotiation between sources and callers.
//!
//! Every domain service runs this before building the field set it asks a
//! source for: guaranteed fields are always mandatory, optional fields follow
//! whatever the caller declared, and unknown fields are left out.

use aggregator_types::{
	AggregatorError, FieldRequirement, FieldRequirements, FieldSupport, Result, SupportRecord,
};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

/// Resolves per-field requirement levels for one source.
///
/// `Present` always yields `Required`, whatever the caller asked for. For
/// `Optional` fields the caller's specific level wins, then its default, then
/// `BestEffort`. Fields missing from `support` are omitted.
pub fn calculate_field_requirements<F>(
	support: &SupportRecord<F>,
	requirements: Option<&FieldRequirements<F>>,
) -> HashMap<F, FieldRequirement>
where
	F: Eq + Hash + Clone,
{
	support
		.iter()
		.map(|(field, level)| {
			let resolved = match level {
				FieldSupport::Present => FieldRequirement::Required,
				FieldSupport::Optional => requirements
					.and_then(|requirements| requirements.level_for(field))
					.unwrap_or(FieldRequirement::BestEffort),
			};
			(field.clone(), resolved)
		})
		.collect()
}

/// Fails on the first requested field the source does not list at all.
pub fn ensure_supported<'a, F, I>(
	source_name: &str,
	support: &SupportRecord<F>,
	requested: I,
) -> Result<()>
where
	F: Eq + Hash + Display + 'a,
	I: IntoIterator<Item = &'a F>,
{
	for field in requested {
		if !support.contains_key(field) {
			return Err(AggregatorError::UnsupportedField {
				field: field.to_string(),
				source_name: source_name.to_string(),
			});
		}
	}
	Ok(())
}

/// Fields that results must carry to be usable.
pub fn mandatory_fields<F>(resolved: &HashMap<F, FieldRequirement>) -> HashSet<F>
where
	F: Eq + Hash + Clone,
{
	resolved
		.iter()
		.filter(|(_, level)| **level == FieldRequirement::Required)
		.map(|(field, _)| field.clone())
		.collect()
}
