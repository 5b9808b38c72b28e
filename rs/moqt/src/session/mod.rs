//! The request lifecycle: setup, request ids, flow control and correlation of responses.
//!
//! A [Session] never performs I/O. Messages from the peer are applied with [Session::handle_message],
//! usually via the [crate::Dispatcher], and encoded frames are drained with [Session::poll_send].

mod event;
mod request;
mod send;
mod state;

pub use event::*;
pub use request::*;
pub use send::SendToken;
pub use state::SessionState;

pub(crate) use send::PendingSends;

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
	Result,
	coding::Version,
	config::SessionConfig,
	ietf::{ControlMessage, Location, MessageParameters, RequestId, TrackNamespace},
};

use state::State;

/// A cheaply clonable handle to a MOQT session.
///
/// Every mutation happens under a single lock, so the handle can be shared between the tasks
/// reading each stream.
#[derive(Clone)]
pub struct Session {
	state: Arc<Mutex<State>>,
}

impl Session {
	pub fn new(config: SessionConfig) -> Self {
		Self {
			state: Arc::new(Mutex::new(State::new(config))),
		}
	}

	/// Queue CLIENT_SETUP with our versions, MAX_REQUEST_ID, PATH and IMPLEMENTATION.
	pub fn connect(&self) -> Result<()> {
		self.state.lock().connect()
	}

	/// Apply a control message from the peer, returning the resulting events.
	pub fn handle_message(&self, msg: ControlMessage) -> Result<Vec<Event>> {
		self.state.lock().handle(msg)
	}

	/// Subscribe to a track, allocating the next request id and a track alias.
	pub fn subscribe(
		&self,
		namespace: impl Into<TrackNamespace>,
		name: impl Into<Bytes>,
		parameters: MessageParameters,
	) -> Result<RequestId> {
		self.state.lock().subscribe(namespace.into(), name.into(), parameters)
	}

	/// Offer a track to the peer, allocating the next request id and a track alias.
	pub fn publish(
		&self,
		namespace: impl Into<TrackNamespace>,
		name: impl Into<Bytes>,
		parameters: MessageParameters,
	) -> Result<RequestId> {
		self.state.lock().publish(namespace.into(), name.into(), parameters)
	}

	/// Request the objects between `start` and `end`, inclusive.
	pub fn fetch(
		&self,
		namespace: impl Into<TrackNamespace>,
		name: impl Into<Bytes>,
		start: Location,
		end: Location,
		parameters: MessageParameters,
	) -> Result<RequestId> {
		self.state
			.lock()
			.fetch(namespace.into(), name.into(), start, end, parameters)
	}

	pub fn track_status(
		&self,
		namespace: impl Into<TrackNamespace>,
		name: impl Into<Bytes>,
		parameters: MessageParameters,
	) -> Result<RequestId> {
		self.state
			.lock()
			.track_status(namespace.into(), name.into(), parameters)
	}

	pub fn subscribe_namespace(&self, prefix: impl Into<TrackNamespace>, parameters: MessageParameters) -> Result<RequestId> {
		self.state.lock().subscribe_namespace(prefix.into(), parameters)
	}

	pub fn publish_namespace(
		&self,
		namespace: impl Into<TrackNamespace>,
		parameters: MessageParameters,
	) -> Result<RequestId> {
		self.state.lock().publish_namespace(namespace.into(), parameters)
	}

	/// Replace the parameters of one of our subscriptions.
	pub fn subscribe_update(&self, request_id: RequestId, parameters: MessageParameters) -> Result<()> {
		self.state.lock().subscribe_update(request_id, parameters)
	}

	/// Answer a pending request from the peer with the matching OK.
	pub fn accept(&self, request_id: RequestId, parameters: MessageParameters) -> Result<()> {
		self.state.lock().accept(request_id, parameters)
	}

	/// Answer a pending request from the peer with REQUEST_ERROR.
	pub fn reject(&self, request_id: RequestId, error_code: impl Into<u64>, reason_phrase: &str) -> Result<()> {
		self.state.lock().reject(request_id, error_code.into(), reason_phrase)
	}

	pub fn unsubscribe(&self, request_id: RequestId) -> Result<()> {
		self.state.lock().unsubscribe(request_id)
	}

	pub fn fetch_cancel(&self, request_id: RequestId) -> Result<()> {
		self.state.lock().fetch_cancel(request_id)
	}

	pub fn unsubscribe_namespace(&self, request_id: RequestId) -> Result<()> {
		self.state.lock().unsubscribe_namespace(request_id)
	}

	pub fn publish_namespace_cancel(&self, request_id: RequestId) -> Result<()> {
		self.state.lock().publish_namespace_cancel(request_id)
	}

	/// End a subscription we serve, or a track we publish.
	pub fn publish_done(&self, request_id: RequestId, status_code: impl Into<u64>, reason_phrase: &str) -> Result<()> {
		self.state
			.lock()
			.publish_done(request_id, status_code.into(), reason_phrase)
	}

	pub fn publish_namespace_done(
		&self,
		request_id: RequestId,
		status_code: impl Into<u64>,
		reason_phrase: &str,
	) -> Result<()> {
		self.state
			.lock()
			.publish_namespace_done(request_id, status_code.into(), reason_phrase)
	}

	/// Allow the peer to use request ids up to and including `maximum`.
	pub fn grant_request_ids(&self, maximum: u64) -> Result<()> {
		self.state.lock().grant_request_ids(maximum)
	}

	/// Send GOAWAY and stop issuing new requests.
	pub fn goaway(&self, new_session_uri: impl Into<String>) -> Result<()> {
		self.state.lock().goaway(new_session_uri.into())
	}

	pub fn close(&self, code: u64) {
		self.state.lock().close(code)
	}

	/// Take the next encoded control frame.
	///
	/// The bytes stay in the pending arena until [Session::send_complete] is called with the token.
	pub fn poll_send(&self) -> Option<(SendToken, Bytes)> {
		self.state.lock().poll_send()
	}

	/// Release a buffer once the transport is done with it. Returns false for an unknown token.
	pub fn send_complete(&self, token: SendToken) -> bool {
		self.state.lock().send_complete(token)
	}

	pub fn pending_sends(&self) -> usize {
		self.state.lock().pending_sends()
	}

	pub fn state(&self) -> SessionState {
		self.state.lock().status()
	}

	/// The negotiated version, or our preferred version before setup.
	pub fn version(&self) -> Version {
		self.state.lock().version()
	}

	pub fn config(&self) -> SessionConfig {
		self.state.lock().config().clone()
	}

	pub fn peer_max_request_id(&self) -> Option<u64> {
		self.state.lock().peer_max_request_id()
	}

	pub fn max_request_id(&self) -> u64 {
		self.state.lock().max_request_id()
	}

	/// A snapshot of a request, until it finishes.
	pub fn request(&self, request_id: RequestId) -> Option<Request> {
		self.state.lock().request(request_id).cloned()
	}

	/// A snapshot of every open request, ordered by id.
	pub fn requests(&self) -> Vec<Request> {
		self.state.lock().requests().cloned().collect()
	}

	pub(crate) fn alias_request(&self, alias: u64) -> Option<RequestId> {
		self.state.lock().alias_request(alias)
	}

	pub(crate) fn alias_closed(&self, alias: u64) -> bool {
		self.state.lock().alias_closed(alias)
	}

	pub(crate) fn fetch_complete(&self, request_id: RequestId) -> Option<Event> {
		self.state.lock().fetch_complete(request_id)
	}

	pub(crate) fn fetch_failed(&self, request_id: RequestId, code: u64) -> Option<Event> {
		self.state.lock().fetch_failed(request_id, code)
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("Session")
			.field("role", &state.config().role)
			.field("state", &state.status())
			.field("version", &state.version())
			.finish()
	}
}
