use crate::{
	coding::{Version, Versions},
	data::ExtensionPolicy,
};

/// Which side of the connection this session is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
	/// Sends CLIENT_SETUP and allocates even request ids.
	#[default]
	Client,

	/// Answers with SERVER_SETUP and allocates odd request ids.
	Server,
}

impl Role {
	/// The first request id allocated by this role.
	pub fn first_request_id(&self) -> u64 {
		match self {
			Self::Client => 0,
			Self::Server => 1,
		}
	}

	pub fn peer(&self) -> Self {
		match self {
			Self::Client => Self::Server,
			Self::Server => Self::Client,
		}
	}
}

/// What to do with objects for a track alias after UNSUBSCRIBE or PUBLISH_DONE.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum StreamEndPolicy {
	/// Discard objects that arrive on streams for a closed alias.
	Abort,

	/// Keep delivering objects from streams that were already in flight.
	#[default]
	Drain,
}

/// The knobs for a single session.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct SessionConfig {
	pub role: Role,

	/// Supported versions in preferred order.
	pub versions: Versions,

	/// The PATH setup parameter, sent by the client.
	pub path: Option<String>,

	/// The IMPLEMENTATION setup parameter.
	pub implementation: Option<String>,

	/// The largest request id the peer may use, advertised during setup.
	pub max_request_id: u64,

	/// Raise our limit by this much whenever the peer reports REQUESTS_BLOCKED.
	pub auto_grant_window: Option<u64>,

	/// Skip unknown control messages instead of closing the session.
	pub skip_unknown_messages: bool,

	pub extension_policy: ExtensionPolicy,
	pub stream_end_policy: StreamEndPolicy,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			role: Role::default(),
			versions: [Version::DRAFT_15].into(),
			path: None,
			implementation: Some(concat!("moqt-rs/", env!("CARGO_PKG_VERSION")).to_string()),
			max_request_id: 100,
			auto_grant_window: None,
			skip_unknown_messages: true,
			extension_policy: ExtensionPolicy::default(),
			stream_end_policy: StreamEndPolicy::default(),
		}
	}
}

impl SessionConfig {
	pub fn client() -> Self {
		Self::default()
	}

	pub fn server() -> Self {
		Self {
			role: Role::Server,
			..Self::default()
		}
	}
}
