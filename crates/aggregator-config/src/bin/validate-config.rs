//! Configuration validation utility
//!
//! Usage: cargo run --bin validate-config config/example.toml

use std::env;
use std::process;

use aggregator_config::ConfigLoader;
use aggregator_monitoring::{init_tracing, TracingConfig};

fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() != 2 {
		eprintln!("Usage: {} <config-file>", args[0]);
		process::exit(1);
	}

	if let Err(e) = init_tracing(TracingConfig::default().with_level(tracing::Level::WARN)) {
		eprintln!("Failed to initialize logging: {}", e);
	}

	let config_path = &args[1];

	println!("Validating configuration file: {}", config_path);

	match ConfigLoader::from_env_and_file(config_path) {
		Ok(config) => {
			println!("✅ Configuration is valid!");
			println!("Service name: {}", config.service.name);
			println!("Chains configured: {}", config.chains.len());
			let mut chains: Vec<_> = config.chains.iter().collect();
			chains.sort_by_key(|(chain_id, _)| **chain_id);
			for (chain_id, chain) in chains {
				println!(
					"  {} ({}): {} RPC endpoint(s)",
					chain_id,
					chain.name,
					chain.rpc_urls.len()
				);
			}
			println!(
				"Router: threshold {}, {} samples before skip, {} attempts max",
				config.router.min_success_rate_threshold,
				config.router.min_samples_before_skip,
				config.router.max_attempts_per_request
			);
			println!(
				"Cache: ttl {}s, max size {:?}",
				config.cache.ttl_secs, config.cache.max_size
			);
		}
		Err(e) => {
			eprintln!("❌ Configuration validation failed:");
			eprintln!("{:#}", e);
			process::exit(1);
		}
	}
}
