use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use bytes::Bytes;

use crate::{
	Error, Result,
	coding::Version,
	config::{Role, SessionConfig},
	ietf::*,
	session::{
		Event, FetchSession, FetchStatus, IncomingRequest, Origin, PendingSends, Request, RequestKind, RequestState,
		SendToken, Track,
	},
};

// Released aliases above the allocation high-water mark that are still remembered.
const MAX_RETIRED_ALIASES: usize = 1024;

/// Idle → Connecting → Established → Draining → Closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
	Idle,

	/// CLIENT_SETUP was sent and we're waiting for SERVER_SETUP.
	Connecting,
	Established,

	/// GOAWAY was sent or received; existing requests continue but no new ones are issued.
	Draining,
	Closed,
}

pub(super) struct State {
	config: SessionConfig,
	status: SessionState,
	version: Version,

	// Our next request id, and the largest the peer allows.
	next_request_id: RequestId,
	peer_max_request_id: Option<u64>,

	// The largest request id we allow, and the lowest the peer may use next.
	max_request_id: u64,
	next_remote_id: u64,

	// Every alias below next_alias has been in use at some point.
	next_alias: u64,
	aliases: HashMap<u64, RequestId>,

	// Released aliases at or above next_alias, which only the peer can have used.
	retired_aliases: BTreeSet<u64>,

	// Open requests; finished ones are removed.
	requests: BTreeMap<RequestId, Request>,

	outbox: VecDeque<Bytes>,
	pending: PendingSends,
}

impl State {
	pub fn new(config: SessionConfig) -> Self {
		Self {
			status: SessionState::Idle,
			version: config.versions.first().copied().unwrap_or(Version::DRAFT_15),
			next_request_id: RequestId(config.role.first_request_id()),
			peer_max_request_id: None,
			max_request_id: config.max_request_id,
			next_remote_id: config.role.peer().first_request_id(),
			next_alias: 0,
			aliases: HashMap::new(),
			retired_aliases: BTreeSet::new(),
			requests: BTreeMap::new(),
			outbox: VecDeque::new(),
			pending: PendingSends::default(),
			config,
		}
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn status(&self) -> SessionState {
		self.status
	}

	pub fn version(&self) -> Version {
		self.version
	}

	pub fn peer_max_request_id(&self) -> Option<u64> {
		self.peer_max_request_id
	}

	pub fn max_request_id(&self) -> u64 {
		self.max_request_id
	}

	pub fn request(&self, request_id: RequestId) -> Option<&Request> {
		self.requests.get(&request_id)
	}

	pub fn requests(&self) -> impl Iterator<Item = &Request> {
		self.requests.values()
	}

	fn set_status(&mut self, status: SessionState) {
		if self.status != status {
			tracing::info!(from = ?self.status, to = ?status, "session state");
			self.status = status;
		}
	}

	fn encode(&self, msg: impl Into<ControlMessage>, version: Version) -> Result<Bytes> {
		let msg = msg.into();
		let buf = msg.encode_bytes(version)?;

		tracing::debug!(message = ?msg, "sending control message");
		tracing::trace!(hex = %hex::encode(&buf), "encoded control message");

		Ok(buf)
	}

	fn send(&mut self, msg: impl Into<ControlMessage>) -> Result<()> {
		let buf = self.encode(msg, self.version)?;
		self.outbox.push_back(buf);
		Ok(())
	}

	pub fn poll_send(&mut self) -> Option<(SendToken, Bytes)> {
		let buf = self.outbox.pop_front()?;
		let token = self.pending.insert(buf.clone());
		Some((token, buf))
	}

	pub fn send_complete(&mut self, token: SendToken) -> bool {
		self.pending.remove(token).is_some()
	}

	pub fn pending_sends(&self) -> usize {
		self.pending.len()
	}

	fn setup_parameters(&self) -> Parameters {
		let mut parameters = Parameters::default();
		parameters.set_varint(ParameterVarInt::MaxRequestId, self.max_request_id);
		if let Some(implementation) = &self.config.implementation {
			parameters.set_bytes(ParameterBytes::Implementation, implementation.clone().into_bytes());
		}
		parameters
	}

	pub fn connect(&mut self) -> Result<()> {
		if self.config.role != Role::Client || self.status != SessionState::Idle {
			return Err(Error::WrongState);
		}

		let mut parameters = self.setup_parameters();
		if let Some(path) = &self.config.path {
			parameters.set_bytes(ParameterBytes::Path, path.clone().into_bytes());
		}

		let setup = ClientSetup {
			versions: self.config.versions.clone(),
			parameters,
		};

		self.send(setup)?;
		self.set_status(SessionState::Connecting);

		Ok(())
	}

	/// Apply a message from the peer's control stream.
	///
	/// The state is validated before anything is mutated, so an error leaves it unchanged.
	pub fn handle(&mut self, msg: ControlMessage) -> Result<Vec<Event>> {
		tracing::debug!(message = ?msg, "received control message");

		match self.status {
			SessionState::Closed => return Err(Error::Closed),
			SessionState::Idle | SessionState::Connecting => return self.handle_setup(msg),
			SessionState::Established | SessionState::Draining => {}
		}

		match msg {
			ControlMessage::ClientSetup(_) | ControlMessage::ServerSetup(_) => {
				Err(Error::ProtocolViolation("duplicate setup"))
			}
			ControlMessage::GoAway(msg) => self.on_goaway(msg),
			ControlMessage::MaxRequestId(msg) => self.on_max_request_id(msg),
			ControlMessage::RequestsBlocked(msg) => self.on_requests_blocked(msg),
			ControlMessage::RequestOk(msg) => self.on_ok(msg.request_id, None, msg.parameters),
			ControlMessage::SubscribeOk(msg) => self.on_ok(msg.request_id, Some(RequestKind::Subscribe), msg.parameters),
			ControlMessage::PublishOk(msg) => self.on_ok(msg.request_id, Some(RequestKind::Publish), msg.parameters),
			ControlMessage::FetchOk(msg) => self.on_ok(msg.request_id, Some(RequestKind::Fetch), msg.parameters),
			ControlMessage::RequestError(msg) => self.on_error(msg),
			ControlMessage::Subscribe(msg) => self.on_subscribe(msg),
			ControlMessage::Publish(msg) => self.on_publish(msg),
			ControlMessage::Fetch(msg) => self.on_fetch(msg),
			ControlMessage::TrackStatus(msg) => self.on_track_status(msg),
			ControlMessage::SubscribeNamespace(msg) => self.on_subscribe_namespace(msg),
			ControlMessage::PublishNamespace(msg) => self.on_publish_namespace(msg),
			ControlMessage::SubscribeUpdate(msg) => self.on_subscribe_update(msg),
			ControlMessage::Unsubscribe(msg) => self.on_cancel(msg.request_id, is_remote_subscribe),
			ControlMessage::FetchCancel(msg) => self.on_cancel(msg.request_id, is_remote_fetch),
			ControlMessage::UnsubscribeNamespace(msg) => self.on_cancel(msg.request_id, is_remote_subscribe_namespace),
			ControlMessage::PublishNamespaceCancel(msg) => self.on_cancel(msg.request_id, is_local_publish_namespace),
			ControlMessage::PublishDone(msg) => self.on_publish_done(msg),
			ControlMessage::PublishNamespaceDone(msg) => self.on_publish_namespace_done(msg),
			ControlMessage::Unknown { id, .. } => {
				tracing::debug!(id, "skipping unknown control message");
				Ok(Vec::new())
			}
		}
	}

	fn handle_setup(&mut self, msg: ControlMessage) -> Result<Vec<Event>> {
		match (self.config.role, msg) {
			(Role::Server, ControlMessage::ClientSetup(setup)) => self.on_client_setup(setup),
			(Role::Client, ControlMessage::ServerSetup(setup)) if self.status == SessionState::Connecting => {
				self.on_server_setup(setup)
			}
			(_, ControlMessage::ClientSetup(_) | ControlMessage::ServerSetup(_)) => {
				Err(Error::ProtocolViolation("unexpected setup"))
			}
			(_, msg) => Err(Error::UnexpectedMessage(msg.id())),
		}
	}

	fn on_client_setup(&mut self, setup: ClientSetup) -> Result<Vec<Event>> {
		let version = self.config.versions.select(&setup.versions).ok_or(Error::Version)?;

		let reply = ServerSetup {
			version,
			parameters: self.setup_parameters(),
		};
		let buf = self.encode(reply, version)?;

		tracing::info!(?version, path = ?setup.parameters.path(), "client setup");

		self.version = version;
		self.peer_max_request_id = setup.parameters.max_request_id();
		self.outbox.push_back(buf);
		self.set_status(SessionState::Established);

		Ok(vec![Event::Established { version }])
	}

	fn on_server_setup(&mut self, setup: ServerSetup) -> Result<Vec<Event>> {
		if !self.config.versions.contains(&setup.version) {
			return Err(Error::Version);
		}

		self.version = setup.version;
		self.peer_max_request_id = setup.parameters.max_request_id();
		self.set_status(SessionState::Established);

		Ok(vec![Event::Established { version: setup.version }])
	}

	fn on_goaway(&mut self, msg: GoAway) -> Result<Vec<Event>> {
		self.set_status(SessionState::Draining);
		Ok(vec![Event::GoAway {
			new_session_uri: msg.new_session_uri,
		}])
	}

	fn on_max_request_id(&mut self, msg: MaxRequestId) -> Result<Vec<Event>> {
		let maximum = msg.request_id.0;
		if self.peer_max_request_id.is_some_and(|current| maximum <= current) {
			return Err(Error::ProtocolViolation("MAX_REQUEST_ID must increase"));
		}

		self.peer_max_request_id = Some(maximum);
		Ok(vec![Event::RequestsUnblocked { maximum }])
	}

	fn on_requests_blocked(&mut self, msg: RequestsBlocked) -> Result<Vec<Event>> {
		if let Some(window) = self.config.auto_grant_window.filter(|w| *w > 0) {
			let maximum = self.max_request_id.saturating_add(window);
			self.grant_request_ids(maximum)?;
		}

		Ok(vec![Event::RequestsBlocked {
			maximum: msg.maximum.0,
		}])
	}

	pub fn grant_request_ids(&mut self, maximum: u64) -> Result<()> {
		if self.status == SessionState::Closed {
			return Err(Error::Closed);
		}
		if maximum <= self.max_request_id {
			return Err(Error::WrongState);
		}

		self.send(MaxRequestId {
			request_id: RequestId(maximum),
		})?;
		self.max_request_id = maximum;

		Ok(())
	}

	pub fn goaway(&mut self, new_session_uri: String) -> Result<()> {
		match self.status {
			SessionState::Established | SessionState::Draining => {}
			SessionState::Closed => return Err(Error::Closed),
			SessionState::Idle | SessionState::Connecting => return Err(Error::WrongState),
		}

		self.send(GoAway { new_session_uri })?;
		self.set_status(SessionState::Draining);

		Ok(())
	}

	pub fn close(&mut self, code: u64) {
		if self.status == SessionState::Closed {
			return;
		}

		tracing::info!(code, "session closed");

		// Keep what was still open, so it can be inspected after the fact.
		for request in self.requests.values_mut() {
			request.state = RequestState::Failed;
		}
		self.set_status(SessionState::Closed);
	}

	// ---- Outgoing requests ----

	fn check_issue(&self) -> Result<()> {
		match self.status {
			SessionState::Established => Ok(()),
			SessionState::Draining => Err(Error::Draining),
			SessionState::Closed => Err(Error::Closed),
			SessionState::Idle | SessionState::Connecting => Err(Error::WrongState),
		}
	}

	// The next request id, or queue REQUESTS_BLOCKED if the peer doesn't allow it.
	fn reserve_request_id(&mut self) -> Result<RequestId> {
		self.check_issue()?;

		let id = self.next_request_id;
		match self.peer_max_request_id {
			Some(maximum) if id.0 <= maximum => Ok(id),
			maximum => {
				let maximum = maximum.unwrap_or(0);
				tracing::warn!(%id, maximum, "requests blocked");

				self.send(RequestsBlocked {
					maximum: RequestId(maximum),
				})?;
				Err(Error::RequestBlocked { maximum })
			}
		}
	}

	fn reserve_alias(&self) -> u64 {
		let mut alias = self.next_alias;
		while self.aliases.contains_key(&alias) {
			alias += 1;
		}
		alias
	}

	fn insert(&mut self, request: Request) {
		if let Some(alias) = request.track_alias() {
			self.aliases.insert(alias, request.id);
			self.retired_aliases.remove(&alias);
		}
		self.requests.insert(request.id, request);
	}

	fn issue(&mut self, request: Request, msg: impl Into<ControlMessage>) -> Result<RequestId> {
		let buf = self.encode(msg, self.version)?;

		self.next_request_id.increment();
		if let Some(alias) = request.track_alias() {
			self.next_alias = alias + 1;
			self.retired_aliases = self.retired_aliases.split_off(&self.next_alias);
		}

		tracing::debug!(id = %request.id, kind = ?request.kind, "issued request");

		let id = request.id;
		self.insert(request);
		self.outbox.push_back(buf);

		Ok(id)
	}

	pub fn subscribe(&mut self, namespace: TrackNamespace, name: Bytes, parameters: MessageParameters) -> Result<RequestId> {
		let request_id = self.reserve_request_id()?;
		let track_alias = self.reserve_alias();

		let msg = Subscribe {
			request_id,
			track_alias,
			track_namespace: namespace.clone(),
			track_name: name.clone(),
			parameters: parameters.clone(),
		};

		let mut request = Request::new(request_id, RequestKind::Subscribe, Origin::Local, parameters);
		request.track = Some(Track {
			namespace,
			name,
			alias: track_alias,
		});

		self.issue(request, msg)
	}

	pub fn publish(&mut self, namespace: TrackNamespace, name: Bytes, parameters: MessageParameters) -> Result<RequestId> {
		let request_id = self.reserve_request_id()?;
		let track_alias = self.reserve_alias();

		let msg = Publish {
			request_id,
			track_alias,
			track_namespace: namespace.clone(),
			track_name: name.clone(),
			parameters: parameters.clone(),
		};

		let mut request = Request::new(request_id, RequestKind::Publish, Origin::Local, parameters);
		request.track = Some(Track {
			namespace,
			name,
			alias: track_alias,
		});

		self.issue(request, msg)
	}

	pub fn fetch(
		&mut self,
		namespace: TrackNamespace,
		name: Bytes,
		start: Location,
		end: Location,
		parameters: MessageParameters,
	) -> Result<RequestId> {
		let request_id = self.reserve_request_id()?;

		let msg = Fetch {
			request_id,
			track_namespace: namespace.clone(),
			track_name: name.clone(),
			start,
			end,
			parameters: parameters.clone(),
		};

		let mut request = Request::new(request_id, RequestKind::Fetch, Origin::Local, parameters);
		request.fetch = Some(FetchSession {
			namespace,
			name,
			start,
			end,
		});

		self.issue(request, msg)
	}

	pub fn track_status(
		&mut self,
		namespace: TrackNamespace,
		name: Bytes,
		parameters: MessageParameters,
	) -> Result<RequestId> {
		let request_id = self.reserve_request_id()?;

		let msg = TrackStatus {
			request_id,
			track_namespace: namespace.clone(),
			track_name: name,
			parameters: parameters.clone(),
		};

		let mut request = Request::new(request_id, RequestKind::TrackStatus, Origin::Local, parameters);
		request.namespace = Some(namespace);

		self.issue(request, msg)
	}

	pub fn subscribe_namespace(&mut self, prefix: TrackNamespace, parameters: MessageParameters) -> Result<RequestId> {
		let request_id = self.reserve_request_id()?;

		let msg = SubscribeNamespace {
			request_id,
			namespace_prefix: prefix.clone(),
			parameters: parameters.clone(),
		};

		let mut request = Request::new(request_id, RequestKind::SubscribeNamespace, Origin::Local, parameters);
		request.namespace = Some(prefix);

		self.issue(request, msg)
	}

	pub fn publish_namespace(&mut self, namespace: TrackNamespace, parameters: MessageParameters) -> Result<RequestId> {
		let request_id = self.reserve_request_id()?;

		let msg = PublishNamespace {
			request_id,
			track_namespace: namespace.clone(),
			parameters: parameters.clone(),
		};

		let mut request = Request::new(request_id, RequestKind::PublishNamespace, Origin::Local, parameters);
		request.namespace = Some(namespace);

		self.issue(request, msg)
	}

	pub fn subscribe_update(&mut self, request_id: RequestId, parameters: MessageParameters) -> Result<()> {
		self.check_open()?;

		let request = self.requests.get(&request_id).ok_or(Error::UnknownRequest(request_id))?;
		if !is_local_subscribe(request) || request.is_terminal() {
			return Err(Error::WrongState);
		}

		self.send(SubscribeUpdate {
			request_id,
			parameters: parameters.clone(),
		})?;

		if let Some(request) = self.requests.get_mut(&request_id) {
			request.parameters = parameters;
		}

		Ok(())
	}

	// ---- Answering incoming requests ----

	fn check_open(&self) -> Result<()> {
		match self.status {
			SessionState::Closed => Err(Error::Closed),
			_ => Ok(()),
		}
	}

	fn pending_remote(&self, request_id: RequestId) -> Result<RequestKind> {
		let request = self
			.requests
			.get(&request_id)
			.filter(|r| r.origin == Origin::Remote)
			.ok_or(Error::UnknownRequest(request_id))?;

		match request.state {
			RequestState::Pending => Ok(request.kind),
			_ => Err(Error::WrongState),
		}
	}

	pub fn accept(&mut self, request_id: RequestId, parameters: MessageParameters) -> Result<()> {
		self.check_open()?;

		let msg: ControlMessage = match self.pending_remote(request_id)? {
			RequestKind::Subscribe => SubscribeOk { request_id, parameters }.into(),
			RequestKind::Publish => PublishOk { request_id, parameters }.into(),
			RequestKind::Fetch => FetchOk { request_id, parameters }.into(),
			_ => RequestOk { request_id, parameters }.into(),
		};

		self.send(msg)?;

		if let Some(request) = self.requests.get_mut(&request_id) {
			request.state = RequestState::Active;
		}

		Ok(())
	}

	pub fn reject(&mut self, request_id: RequestId, error_code: u64, reason_phrase: &str) -> Result<()> {
		self.check_open()?;
		self.pending_remote(request_id)?;

		self.send(RequestError {
			request_id,
			error_code,
			reason_phrase: reason_phrase.to_string(),
		})?;

		self.finish(request_id, RequestState::Failed);

		Ok(())
	}

	// ---- Cancellation ----

	// Close a request we're allowed to cancel; a request that is already terminal sends nothing.
	fn cancel(
		&mut self,
		request_id: RequestId,
		allowed: fn(&Request) -> bool,
		msg: impl Into<ControlMessage>,
	) -> Result<()> {
		self.check_open()?;

		let Some(request) = self.requests.get(&request_id) else {
			if self.is_finished(request_id) {
				tracing::debug!(%request_id, "request already finished");
				return Ok(());
			}
			return Err(Error::UnknownRequest(request_id));
		};

		if !allowed(request) {
			return Err(Error::WrongState);
		}

		self.send(msg)?;
		self.finish(request_id, RequestState::Closed);

		Ok(())
	}

	pub fn unsubscribe(&mut self, request_id: RequestId) -> Result<()> {
		self.cancel(request_id, is_local_subscribe, Unsubscribe { request_id })
	}

	pub fn fetch_cancel(&mut self, request_id: RequestId) -> Result<()> {
		self.cancel(request_id, is_local_fetch, FetchCancel { request_id })
	}

	pub fn unsubscribe_namespace(&mut self, request_id: RequestId) -> Result<()> {
		self.cancel(request_id, is_local_subscribe_namespace, UnsubscribeNamespace { request_id })
	}

	pub fn publish_namespace_cancel(&mut self, request_id: RequestId) -> Result<()> {
		self.cancel(request_id, is_remote_publish_namespace, PublishNamespaceCancel { request_id })
	}

	pub fn publish_done(&mut self, request_id: RequestId, status_code: u64, reason_phrase: &str) -> Result<()> {
		let msg = PublishDone {
			request_id,
			status_code,
			reason_phrase: reason_phrase.to_string(),
		};
		self.cancel(request_id, is_publisher_side, msg)
	}

	pub fn publish_namespace_done(&mut self, request_id: RequestId, status_code: u64, reason_phrase: &str) -> Result<()> {
		let msg = PublishNamespaceDone {
			request_id,
			status_code,
			reason_phrase: reason_phrase.to_string(),
		};
		self.cancel(request_id, is_local_publish_namespace, msg)
	}

	// Drop a request from the table once its outcome is known.
	fn finish(&mut self, request_id: RequestId, state: RequestState) {
		let Some(request) = self.requests.remove(&request_id) else {
			return;
		};

		tracing::debug!(%request_id, kind = ?request.kind, ?state, "request finished");

		if let Some(alias) = request.track_alias() {
			self.release_alias(alias, request_id);
		}
	}

	// A request we've seen that is no longer in the table.
	fn is_finished(&self, request_id: RequestId) -> bool {
		if self.requests.contains_key(&request_id) {
			return false;
		}

		match request_id.0 % 2 == self.config.role.first_request_id() {
			true => request_id < self.next_request_id,
			false => request_id.0 < self.next_remote_id,
		}
	}

	fn release_alias(&mut self, alias: u64, request_id: RequestId) {
		if self.aliases.get(&alias) != Some(&request_id) {
			return;
		}

		self.aliases.remove(&alias);

		if alias >= self.next_alias {
			self.retired_aliases.insert(alias);
			if self.retired_aliases.len() > MAX_RETIRED_ALIASES {
				self.retired_aliases.pop_first();
			}
		}
	}

	// ---- Incoming messages ----

	fn check_incoming(&self, request_id: RequestId) -> Result<()> {
		if request_id.0 % 2 != self.config.role.peer().first_request_id() {
			return Err(Error::ProtocolViolation("request id has the wrong parity"));
		}
		if request_id.0 < self.next_remote_id {
			return Err(Error::ProtocolViolation("request id was reused"));
		}
		if request_id.0 > self.max_request_id {
			return Err(Error::ProtocolViolation("request id exceeds MAX_REQUEST_ID"));
		}
		Ok(())
	}

	fn incoming(&mut self, request: Request, msg: IncomingRequest) -> Vec<Event> {
		tracing::debug!(id = %request.id, kind = ?request.kind, "incoming request");

		self.next_remote_id = request.id.0 + 2;
		self.insert(request);

		vec![Event::Request(msg)]
	}

	// The alias is already in use, so answer on the application's behalf and create nothing.
	fn reject_duplicate_alias(&mut self, request_id: RequestId, alias: u64) -> Result<Vec<Event>> {
		tracing::warn!(%request_id, alias, "duplicate track alias");

		self.send(RequestError {
			request_id,
			error_code: ErrorCode::DuplicateTrackAlias.into(),
			reason_phrase: "duplicate track alias".to_string(),
		})?;
		self.next_remote_id = request_id.0 + 2;

		Ok(vec![Event::Error(Error::DuplicateTrackAlias(alias))])
	}

	fn on_subscribe(&mut self, msg: Subscribe) -> Result<Vec<Event>> {
		self.check_incoming(msg.request_id)?;

		if self.aliases.contains_key(&msg.track_alias) {
			return self.reject_duplicate_alias(msg.request_id, msg.track_alias);
		}

		let mut request = Request::new(
			msg.request_id,
			RequestKind::Subscribe,
			Origin::Remote,
			msg.parameters.clone(),
		);
		request.track = Some(Track {
			namespace: msg.track_namespace.clone(),
			name: msg.track_name.clone(),
			alias: msg.track_alias,
		});

		Ok(self.incoming(request, IncomingRequest::Subscribe(msg)))
	}

	fn on_publish(&mut self, msg: Publish) -> Result<Vec<Event>> {
		self.check_incoming(msg.request_id)?;

		if self.aliases.contains_key(&msg.track_alias) {
			return self.reject_duplicate_alias(msg.request_id, msg.track_alias);
		}

		let mut request = Request::new(
			msg.request_id,
			RequestKind::Publish,
			Origin::Remote,
			msg.parameters.clone(),
		);
		request.track = Some(Track {
			namespace: msg.track_namespace.clone(),
			name: msg.track_name.clone(),
			alias: msg.track_alias,
		});

		Ok(self.incoming(request, IncomingRequest::Publish(msg)))
	}

	fn on_fetch(&mut self, msg: Fetch) -> Result<Vec<Event>> {
		self.check_incoming(msg.request_id)?;

		let mut request = Request::new(msg.request_id, RequestKind::Fetch, Origin::Remote, msg.parameters.clone());
		request.fetch = Some(FetchSession {
			namespace: msg.track_namespace.clone(),
			name: msg.track_name.clone(),
			start: msg.start,
			end: msg.end,
		});

		Ok(self.incoming(request, IncomingRequest::Fetch(msg)))
	}

	fn on_track_status(&mut self, msg: TrackStatus) -> Result<Vec<Event>> {
		self.check_incoming(msg.request_id)?;

		let mut request = Request::new(
			msg.request_id,
			RequestKind::TrackStatus,
			Origin::Remote,
			msg.parameters.clone(),
		);
		request.namespace = Some(msg.track_namespace.clone());

		Ok(self.incoming(request, IncomingRequest::TrackStatus(msg)))
	}

	fn on_subscribe_namespace(&mut self, msg: SubscribeNamespace) -> Result<Vec<Event>> {
		self.check_incoming(msg.request_id)?;

		let mut request = Request::new(
			msg.request_id,
			RequestKind::SubscribeNamespace,
			Origin::Remote,
			msg.parameters.clone(),
		);
		request.namespace = Some(msg.namespace_prefix.clone());

		Ok(self.incoming(request, IncomingRequest::SubscribeNamespace(msg)))
	}

	fn on_publish_namespace(&mut self, msg: PublishNamespace) -> Result<Vec<Event>> {
		self.check_incoming(msg.request_id)?;

		let mut request = Request::new(
			msg.request_id,
			RequestKind::PublishNamespace,
			Origin::Remote,
			msg.parameters.clone(),
		);
		request.namespace = Some(msg.track_namespace.clone());

		Ok(self.incoming(request, IncomingRequest::PublishNamespace(msg)))
	}

	fn on_ok(
		&mut self,
		request_id: RequestId,
		expected: Option<RequestKind>,
		parameters: MessageParameters,
	) -> Result<Vec<Event>> {
		let request = self
			.requests
			.get_mut(&request_id)
			.filter(|r| r.origin == Origin::Local && r.state == RequestState::Pending)
			.ok_or(Error::UnknownRequest(request_id))?;

		if expected.is_some_and(|kind| kind != request.kind) {
			return Err(Error::ProtocolViolation("response does not match the request"));
		}

		request.state = RequestState::Active;

		Ok(vec![Event::Accepted { request_id, parameters }])
	}

	fn on_error(&mut self, msg: RequestError) -> Result<Vec<Event>> {
		let request_id = msg.request_id;
		self.requests
			.get(&request_id)
			.filter(|r| r.origin == Origin::Local && r.state == RequestState::Pending)
			.ok_or(Error::UnknownRequest(request_id))?;

		self.finish(request_id, RequestState::Failed);

		Ok(vec![Event::Rejected {
			request_id,
			error_code: msg.error_code,
			reason_phrase: msg.reason_phrase,
		}])
	}

	fn on_subscribe_update(&mut self, msg: SubscribeUpdate) -> Result<Vec<Event>> {
		let request = self
			.requests
			.get_mut(&msg.request_id)
			.filter(|r| is_remote_subscribe(r) && !r.is_terminal())
			.ok_or(Error::UnknownRequest(msg.request_id))?;

		request.parameters = msg.parameters.clone();

		Ok(vec![Event::Updated {
			request_id: msg.request_id,
			parameters: msg.parameters,
		}])
	}

	// The peer closed a request; racing with our own cancellation is expected, so terminal is a no-op.
	fn peer_closed(&mut self, request_id: RequestId, allowed: fn(&Request) -> bool) -> Result<bool> {
		let Some(request) = self.requests.get(&request_id) else {
			return match self.is_finished(request_id) {
				true => Ok(false),
				false => Err(Error::UnknownRequest(request_id)),
			};
		};

		if !allowed(request) {
			return Err(Error::UnknownRequest(request_id));
		}
		if request.is_terminal() {
			return Ok(false);
		}

		self.finish(request_id, RequestState::Closed);
		Ok(true)
	}

	fn on_cancel(&mut self, request_id: RequestId, allowed: fn(&Request) -> bool) -> Result<Vec<Event>> {
		match self.peer_closed(request_id, allowed)? {
			true => Ok(vec![Event::Cancelled { request_id }]),
			false => Ok(Vec::new()),
		}
	}

	fn on_publish_done(&mut self, msg: PublishDone) -> Result<Vec<Event>> {
		match self.peer_closed(msg.request_id, is_subscriber_side)? {
			true => Ok(vec![Event::PublishDone {
				request_id: msg.request_id,
				status_code: msg.status_code,
				reason_phrase: msg.reason_phrase,
			}]),
			false => Ok(Vec::new()),
		}
	}

	fn on_publish_namespace_done(&mut self, msg: PublishNamespaceDone) -> Result<Vec<Event>> {
		match self.peer_closed(msg.request_id, is_remote_publish_namespace)? {
			true => Ok(vec![Event::PublishNamespaceDone {
				request_id: msg.request_id,
				status_code: msg.status_code,
				reason_phrase: msg.reason_phrase,
			}]),
			false => Ok(Vec::new()),
		}
	}

	// ---- Data plane ----

	pub fn alias_request(&self, alias: u64) -> Option<RequestId> {
		self.aliases.get(&alias).copied()
	}

	/// The alias was in use and has since been released.
	pub fn alias_closed(&self, alias: u64) -> bool {
		!self.aliases.contains_key(&alias) && (alias < self.next_alias || self.retired_aliases.contains(&alias))
	}

	pub fn fetch_complete(&mut self, request_id: RequestId) -> Option<Event> {
		self.finish_fetch(request_id, RequestState::Closed, FetchStatus::Ok)
	}

	pub fn fetch_failed(&mut self, request_id: RequestId, code: u64) -> Option<Event> {
		self.finish_fetch(request_id, RequestState::Failed, FetchStatus::Error(code))
	}

	fn finish_fetch(&mut self, request_id: RequestId, state: RequestState, status: FetchStatus) -> Option<Event> {
		let request = self.requests.get(&request_id).filter(|r| is_local_fetch(r));
		match request {
			Some(request) if !request.is_terminal() => {
				self.finish(request_id, state);
				Some(Event::FetchComplete { request_id, status })
			}
			Some(_) => None,
			None if self.is_finished(request_id) => {
				tracing::debug!(%request_id, "fetch stream for a finished request");
				None
			}
			None => {
				tracing::warn!(%request_id, "fetch stream for an unknown request");
				None
			}
		}
	}
}

fn is_local_subscribe(r: &Request) -> bool {
	r.kind == RequestKind::Subscribe && r.origin == Origin::Local
}

fn is_remote_subscribe(r: &Request) -> bool {
	r.kind == RequestKind::Subscribe && r.origin == Origin::Remote
}

fn is_local_fetch(r: &Request) -> bool {
	r.kind == RequestKind::Fetch && r.origin == Origin::Local
}

fn is_remote_fetch(r: &Request) -> bool {
	r.kind == RequestKind::Fetch && r.origin == Origin::Remote
}

fn is_local_subscribe_namespace(r: &Request) -> bool {
	r.kind == RequestKind::SubscribeNamespace && r.origin == Origin::Local
}

fn is_remote_subscribe_namespace(r: &Request) -> bool {
	r.kind == RequestKind::SubscribeNamespace && r.origin == Origin::Remote
}

fn is_local_publish_namespace(r: &Request) -> bool {
	r.kind == RequestKind::PublishNamespace && r.origin == Origin::Local
}

fn is_remote_publish_namespace(r: &Request) -> bool {
	r.kind == RequestKind::PublishNamespace && r.origin == Origin::Remote
}

// We send the objects: a subscription from the peer, or our own publish.
fn is_publisher_side(r: &Request) -> bool {
	is_remote_subscribe(r) || (r.kind == RequestKind::Publish && r.origin == Origin::Local)
}

// The peer sends the objects.
fn is_subscriber_side(r: &Request) -> bool {
	is_local_subscribe(r) || (r.kind == RequestKind::Publish && r.origin == Origin::Remote)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retired_aliases_are_bounded() {
		let mut state = State::new(SessionConfig::client());
		let last = 1000 + 2 * MAX_RETIRED_ALIASES as u64;

		// Aliases picked by the peer, well above our own.
		for alias in 1000..last {
			state.aliases.insert(alias, RequestId(1));
			state.release_alias(alias, RequestId(1));
		}

		assert_eq!(state.retired_aliases.len(), MAX_RETIRED_ALIASES);
		assert!(state.alias_closed(last - 1));
		assert!(!state.alias_closed(1000));
		assert!(!state.alias_closed(last));

		// A released alias below our own allocations needs no entry.
		state.next_alias = 10;
		state.aliases.insert(3, RequestId(1));
		state.release_alias(3, RequestId(1));
		assert!(state.alias_closed(3));
		assert_eq!(state.retired_aliases.len(), MAX_RETIRED_ALIASES);
	}
}
