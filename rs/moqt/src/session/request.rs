use bytes::Bytes;

use crate::ietf::{Location, MessageParameters, RequestId, SubscriptionFilter, TrackNamespace};

/// The message that created a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
	Subscribe,
	Publish,
	Fetch,
	SubscribeNamespace,
	PublishNamespace,
	TrackStatus,
}

/// Which side issued the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
	Local,
	Remote,
}

/// Pending → Active → Closed, or Pending → Failed.
///
/// Active requests also fail when a stream they depend on is reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestState {
	Pending,
	Active,
	Closed,
	Failed,
}

impl RequestState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Closed | Self::Failed)
	}
}

/// A track referenced by a subscribe or publish request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
	pub namespace: TrackNamespace,
	pub name: Bytes,

	/// The alias used on data streams and datagrams.
	pub alias: u64,
}

/// How a fetch finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
	/// The fetch stream ended cleanly.
	Ok,

	/// The fetch stream was reset with this code.
	Error(u64),
}

/// The track and range of a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchSession {
	pub namespace: TrackNamespace,
	pub name: Bytes,
	pub start: Location,
	pub end: Location,
}

/// A snapshot of an entry in the request table.
///
/// Requests leave the table once they finish; only a closed session keeps its open requests, as failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
	pub id: RequestId,
	pub kind: RequestKind,
	pub origin: Origin,
	pub state: RequestState,

	/// Set for subscribe and publish.
	pub track: Option<Track>,

	/// The namespace, or namespace prefix, for namespace requests and track status.
	pub namespace: Option<TrackNamespace>,

	/// Set for fetch.
	pub fetch: Option<FetchSession>,

	/// The latest parameters, replaced by SUBSCRIBE_UPDATE.
	pub parameters: MessageParameters,
}

impl Request {
	pub(super) fn new(id: RequestId, kind: RequestKind, origin: Origin, parameters: MessageParameters) -> Self {
		Self {
			id,
			kind,
			origin,
			state: RequestState::Pending,
			track: None,
			namespace: None,
			fetch: None,
			parameters,
		}
	}

	pub fn is_terminal(&self) -> bool {
		self.state.is_terminal()
	}

	/// The subscription filter, defaulting to the latest object.
	pub fn filter(&self) -> SubscriptionFilter {
		self.parameters
			.subscription_filter()
			.unwrap_or(SubscriptionFilter::LatestObject)
	}

	/// The subscriber priority, defaulting to 128.
	pub fn subscriber_priority(&self) -> u8 {
		self.parameters.subscriber_priority().unwrap_or(128)
	}

	pub fn track_alias(&self) -> Option<u64> {
		self.track.as_ref().map(|t| t.alias)
	}
}
