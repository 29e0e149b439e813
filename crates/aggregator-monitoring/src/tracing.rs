use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, Level};
use tracing_subscriber::{
	fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Compact,
	Json,
}

impl FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pretty" => Ok(LogFormat::Pretty),
			"compact" => Ok(LogFormat::Compact),
			"json" => Ok(LogFormat::Json),
			other => Err(format!("Unknown log format: {}", other)),
		}
	}
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
	pub level: Level,
	pub format: LogFormat,
	pub with_thread_ids: bool,
	pub with_file_and_line: bool,
	pub with_target: bool,
	pub with_span_events: FmtSpan,
	/// Extra `EnvFilter` directives, e.g. `aggregator_transport=debug`.
	pub directives: Vec<String>,
}

impl Default for TracingConfig {
	fn default() -> Self {
		Self {
			level: Level::INFO,
			format: LogFormat::Pretty,
			with_thread_ids: true,
			with_file_and_line: true,
			with_target: true,
			with_span_events: FmtSpan::NONE,
			directives: Vec::new(),
		}
	}
}

impl TracingConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_level(mut self, level: Level) -> Self {
		self.level = level;
		self
	}

	pub fn with_format(mut self, format: LogFormat) -> Self {
		self.format = format;
		self
	}

	pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
		self.directives.push(directive.into());
		self
	}

	pub fn debug() -> Self {
		Self::default().with_level(Level::DEBUG)
	}

	pub fn production() -> Self {
		Self {
			level: Level::INFO,
			format: LogFormat::Json,
			with_thread_ids: false,
			with_file_and_line: false,
			with_target: false,
			with_span_events: FmtSpan::NONE,
			directives: Vec::new(),
		}
	}

	/// Builds a config from textual settings such as those found in a config
	/// file. Unknown levels or formats are rejected.
	pub fn from_settings(level: &str, format: &str) -> Result<Self, String> {
		let level = Level::from_str(level).map_err(|_| format!("Unknown log level: {}", level))?;
		let format = LogFormat::from_str(format)?;
		Ok(Self::default().with_level(level).with_format(format))
	}

	fn env_filter(&self) -> Result<EnvFilter, String> {
		let mut filter = EnvFilter::new(self.level.to_string());
		for directive in &self.directives {
			let directive = directive
				.parse()
				.map_err(|e| format!("Invalid filter directive {}: {}", directive, e))?;
			filter = filter.add_directive(directive);
		}
		Ok(filter)
	}
}

/// Initialize tracing with the given configuration
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error>> {
	let subscriber = tracing_subscriber::registry().with(config.env_filter()?);

	match config.format {
		LogFormat::Json => {
			let json_layer = tracing_subscriber::fmt::layer()
				.json()
				.with_span_events(config.with_span_events.clone())
				.with_thread_ids(config.with_thread_ids)
				.with_file(config.with_file_and_line)
				.with_line_number(config.with_file_and_line)
				.with_target(config.with_target);

			subscriber
				.with(json_layer)
				.try_init()
				.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
		}
		LogFormat::Pretty => {
			let fmt_layer = tracing_subscriber::fmt::layer()
				.pretty()
				.with_span_events(config.with_span_events.clone())
				.with_thread_ids(config.with_thread_ids)
				.with_file(config.with_file_and_line)
				.with_line_number(config.with_file_and_line)
				.with_target(config.with_target);

			subscriber
				.with(fmt_layer)
				.try_init()
				.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
		}
		LogFormat::Compact => {
			let fmt_layer = tracing_subscriber::fmt::layer()
				.compact()
				.with_span_events(config.with_span_events.clone())
				.with_thread_ids(config.with_thread_ids)
				.with_target(config.with_target);

			subscriber
				.with(fmt_layer)
				.try_init()
				.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
		}
	}

	info!(
		"Tracing initialized with level {} ({:?} format)",
		config.level, config.format
	);
	Ok(())
}
