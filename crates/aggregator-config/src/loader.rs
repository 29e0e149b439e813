//! Configuration loading from files and environment.

use crate::types::*;
use crate::ConfigError;
use aggregator_types::ChainId;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Overrides `monitoring.log_level`.
pub const LOG_LEVEL_ENV: &str = "AGGREGATOR_LOG_LEVEL";
/// Prefix of per-chain RPC overrides, e.g. `RPC_URLS_1=https://a,https://b`.
pub const RPC_URLS_ENV_PREFIX: &str = "RPC_URLS_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
	/// Load configuration from file
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<AggregatorConfig> {
		let path = path.as_ref();
		info!("Loading configuration from {:?}", path);

		let contents = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {:?}", path))?;

		let config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&contents)?,
			Some("json") => Self::from_json(&contents)?,
			Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
			_ => anyhow::bail!("Unsupported config format: {:?}", path),
		};

		config.validate()?;
		Ok(config)
	}

	/// Load from TOML string
	pub fn from_toml(contents: &str) -> Result<AggregatorConfig> {
		toml::from_str(contents).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))
	}

	/// Load from JSON string
	pub fn from_json(contents: &str) -> Result<AggregatorConfig> {
		serde_json::from_str(contents).context("Failed to parse JSON")
	}

	/// Load from YAML string
	pub fn from_yaml(contents: &str) -> Result<AggregatorConfig> {
		serde_yaml::from_str(contents).context("Failed to parse YAML")
	}

	/// Loads a file and applies overrides from the process environment.
	pub fn from_env_and_file<P: AsRef<Path>>(path: P) -> Result<AggregatorConfig> {
		let mut config = Self::from_file(path)?;
		Self::apply_env_overrides(&mut config, std::env::vars())?;
		config.validate()?;
		Ok(config)
	}

	/// Applies `AGGREGATOR_LOG_LEVEL` and `RPC_URLS_<chain id>` overrides.
	///
	/// RPC overrides replace the endpoint list of a chain that is already
	/// configured; overrides for unknown chains are ignored.
	pub fn apply_env_overrides<I>(config: &mut AggregatorConfig, vars: I) -> Result<(), ConfigError>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		for (name, value) in vars {
			if name == LOG_LEVEL_ENV {
				debug!("Overriding log level from environment");
				config.monitoring.log_level = value;
				continue;
			}

			let Some(chain_id) = name.strip_prefix(RPC_URLS_ENV_PREFIX) else {
				continue;
			};
			let chain_id: ChainId = chain_id.parse().map_err(|e: std::num::ParseIntError| {
				ConfigError::InvalidEnvOverride {
					name: name.clone(),
					reason: e.to_string(),
				}
			})?;

			let urls: Vec<String> = value
				.split(',')
				.map(str::trim)
				.filter(|url| !url.is_empty())
				.map(str::to_string)
				.collect();
			if urls.is_empty() {
				return Err(ConfigError::InvalidEnvOverride {
					name,
					reason: "no URLs given".to_string(),
				});
			}

			match config.chains.get_mut(&chain_id) {
				Some(chain) => {
					debug!(
						"Overriding {} RPC URL(s) for chain {} from environment",
						urls.len(),
						chain_id
					);
					chain.rpc_urls = urls;
				}
				None => warn!("Ignoring {}: chain {} is not configured", name, chain_id),
			}
		}

		Ok(())
	}
}
