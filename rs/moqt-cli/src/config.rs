use std::{fs, path::Path};

use anyhow::Context;
use clap::Args;
use moqt::{Role, SessionConfig, StreamEndPolicy, data::ExtensionPolicy};
use serde::{Deserialize, Serialize};

use crate::log::Log;

/// Everything configurable, either with flags or with a TOML file.
///
/// Flags given explicitly take precedence over the file.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	#[command(flatten)]
	pub log: Log,

	#[command(flatten)]
	pub session: SessionArgs,
}

impl Config {
	pub fn from_file(path: &Path) -> anyhow::Result<Self> {
		let contents = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
		toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
	}

	/// Merge the flags in `self` over the values loaded from a file.
	pub fn merge(self, file: Config) -> Config {
		Config {
			log: self.log.merge(file.log),
			session: self.session.merge(file.session),
		}
	}
}

/// Session flags, mirrored by the `[session]` section of the config file.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionArgs {
	/// The PATH setup parameter sent by the client.
	#[arg(long)]
	pub path: Option<String>,

	/// The largest request id the peer may use.
	#[arg(long)]
	pub max_request_id: Option<u64>,

	/// Grant this many more request ids whenever the peer reports it is blocked.
	#[arg(long)]
	pub auto_grant_window: Option<u64>,

	/// Fail on unknown control messages instead of skipping them.
	#[arg(long)]
	pub strict_messages: bool,

	/// What to do with unknown object extensions: preserve or strict.
	#[arg(long, value_enum)]
	pub extension_policy: Option<ExtensionPolicy>,

	/// What to do with objects for a closed subscription: abort or drain.
	#[arg(long, value_enum)]
	pub stream_end_policy: Option<StreamEndPolicy>,
}

impl SessionArgs {
	pub fn merge(self, file: SessionArgs) -> SessionArgs {
		SessionArgs {
			path: self.path.or(file.path),
			max_request_id: self.max_request_id.or(file.max_request_id),
			auto_grant_window: self.auto_grant_window.or(file.auto_grant_window),
			strict_messages: self.strict_messages || file.strict_messages,
			extension_policy: self.extension_policy.or(file.extension_policy),
			stream_end_policy: self.stream_end_policy.or(file.stream_end_policy),
		}
	}

	/// Build the engine configuration for one side of a connection.
	pub fn session_config(&self, role: Role) -> SessionConfig {
		let mut config = match role {
			Role::Client => SessionConfig::client(),
			Role::Server => SessionConfig::server(),
		};

		if role == Role::Client {
			config.path = self.path.clone();
		}
		if let Some(max) = self.max_request_id {
			config.max_request_id = max;
		}
		config.auto_grant_window = self.auto_grant_window;
		config.skip_unknown_messages = !self.strict_messages;
		if let Some(policy) = self.extension_policy {
			config.extension_policy = policy;
		}
		if let Some(policy) = self.stream_end_policy {
			config.stream_end_policy = policy;
		}

		config
	}
}
