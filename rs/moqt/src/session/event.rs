use crate::{
	Error,
	coding::Version,
	data::{Datagram, Object},
	ietf::{Fetch, MessageParameters, Publish, PublishNamespace, RequestId, Subscribe, SubscribeNamespace, TrackStatus},
	session::FetchStatus,
};

/// A request from the peer, waiting for [crate::Session::accept] or [crate::Session::reject].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncomingRequest {
	Subscribe(Subscribe),
	Publish(Publish),
	Fetch(Fetch),
	TrackStatus(TrackStatus),
	SubscribeNamespace(SubscribeNamespace),
	PublishNamespace(PublishNamespace),
}

impl IncomingRequest {
	pub fn request_id(&self) -> RequestId {
		match self {
			Self::Subscribe(m) => m.request_id,
			Self::Publish(m) => m.request_id,
			Self::Fetch(m) => m.request_id,
			Self::TrackStatus(m) => m.request_id,
			Self::SubscribeNamespace(m) => m.request_id,
			Self::PublishNamespace(m) => m.request_id,
		}
	}
}

/// Something the application should know about, produced by the session or the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
	/// The setup exchange finished.
	Established { version: Version },

	Request(IncomingRequest),

	/// One of our requests was answered with an OK.
	Accepted {
		request_id: RequestId,
		parameters: MessageParameters,
	},

	/// One of our requests was answered with REQUEST_ERROR.
	Rejected {
		request_id: RequestId,
		error_code: u64,
		reason_phrase: String,
	},

	/// SUBSCRIBE_UPDATE changed the parameters of a subscription.
	Updated {
		request_id: RequestId,
		parameters: MessageParameters,
	},

	/// The peer cancelled a request with UNSUBSCRIBE, FETCH_CANCEL, UNSUBSCRIBE_NAMESPACE or PUBLISH_NAMESPACE_CANCEL.
	Cancelled { request_id: RequestId },

	PublishDone {
		request_id: RequestId,
		status_code: u64,
		reason_phrase: String,
	},

	PublishNamespaceDone {
		request_id: RequestId,
		status_code: u64,
		reason_phrase: String,
	},

	/// The peer raised its MAX_REQUEST_ID.
	RequestsUnblocked { maximum: u64 },

	/// The peer reported it can't issue more requests.
	RequestsBlocked { maximum: u64 },

	GoAway { new_session_uri: String },

	/// An object from a subgroup or fetch stream.
	///
	/// The request id is the fetch, or the request that owns the track alias if known.
	Object {
		request_id: Option<RequestId>,
		object: Object,
	},

	Datagram {
		request_id: Option<RequestId>,
		datagram: Datagram,
	},

	/// A subgroup stream finished.
	GroupComplete { track_alias: u64, group_id: u64 },

	FetchComplete {
		request_id: RequestId,
		status: FetchStatus,
	},

	/// A non-fatal error that was reported and otherwise ignored.
	Error(Error),

	/// The session is closed.
	Closed { code: u64 },
}
