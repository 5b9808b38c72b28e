use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging flags, mirrored by the `[log]` section of the config file.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Log {
	/// The default log level. Directives in RUST_LOG take precedence.
	#[arg(id = "log-level", long = "log-level", env = "MOQT_LOG")]
	pub level: Option<String>,

	/// Write logs as JSON lines.
	#[arg(id = "log-json", long = "log-json")]
	pub json: bool,
}

impl Log {
	/// Fill anything not given on the command line from the config file.
	pub fn merge(self, file: Log) -> Log {
		Log {
			level: self.level.or(file.level),
			json: self.json || file.json,
		}
	}

	pub fn level(&self) -> anyhow::Result<LevelFilter> {
		match &self.level {
			Some(level) => level.parse().with_context(|| format!("invalid log level: {level}")),
			None => Ok(LevelFilter::INFO),
		}
	}

	/// Install the global subscriber, writing to stderr so stdout stays machine readable.
	pub fn init(&self) -> anyhow::Result<()> {
		let filter = EnvFilter::builder()
			.with_default_directive(self.level()?.into())
			.from_env_lossy();

		let layer = match self.json {
			true => tracing_subscriber::fmt::layer()
				.json()
				.with_writer(std::io::stderr)
				.with_filter(filter)
				.boxed(),
			false => tracing_subscriber::fmt::layer()
				.with_writer(std::io::stderr)
				.with_filter(filter)
				.boxed(),
		};

		tracing_subscriber::registry()
			.with(layer)
			.try_init()
			.context("failed to install the log subscriber")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_win() {
		let flags = Log {
			level: Some("debug".to_string()),
			json: false,
		};
		let file = Log {
			level: Some("warn".to_string()),
			json: true,
		};

		let merged = flags.merge(file);
		assert_eq!(merged.level.as_deref(), Some("debug"));
		assert!(merged.json);
		assert_eq!(merged.level().unwrap(), LevelFilter::DEBUG);
	}

	#[test]
	fn invalid_level() {
		let log = Log {
			level: Some("loud".to_string()),
			json: false,
		};
		assert!(log.level().is_err());
		assert_eq!(Log::default().level().unwrap(), LevelFilter::INFO);
	}
}
