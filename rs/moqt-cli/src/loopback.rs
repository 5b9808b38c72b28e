use std::time::Duration;

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use clap::Args;
use moqt::{
	Dispatcher, Event, IncomingRequest, Role, Session,
	coding::Encode,
	data::{Datagram, FetchWriter, Object, StreamType, SubgroupHeader, SubgroupId, SubgroupWriter},
	ietf::{ErrorCode, Location, PublishDoneCode, TrackNamespace},
};
use tokio::sync::mpsc;

use crate::config::SessionArgs;

#[derive(Args, Clone, Debug)]
pub struct LoopbackArgs {
	/// The namespace of the track, with fields separated by `/`.
	#[arg(long, default_value = "loopback")]
	pub namespace: String,

	/// The name of the track.
	#[arg(long, default_value = "clock")]
	pub track: String,

	/// The number of objects to publish in the group.
	#[arg(long, default_value_t = 5)]
	pub objects: u64,

	/// Give up if the exchange hasn't finished by then.
	#[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
	pub timeout: Duration,
}

// The control stream uses the same id in both directions.
const CONTROL_STREAM: u64 = 0;

/// What one side writes to the other.
#[derive(Debug)]
enum Packet {
	Stream { id: u64, data: Bytes, fin: bool },
	Datagram(Bytes),
}

// One side of the in-memory connection.
struct Endpoint {
	name: &'static str,
	dispatcher: Dispatcher,
	tx: mpsc::UnboundedSender<Packet>,
	control_open: bool,

	// Server initiated unidirectional streams.
	next_stream: u64,
	lines: Vec<String>,
}

impl Endpoint {
	fn new(name: &'static str, session: Session, tx: mpsc::UnboundedSender<Packet>) -> Self {
		Self {
			name,
			dispatcher: Dispatcher::new(session),
			tx,
			control_open: false,
			next_stream: 3,
			lines: Vec::new(),
		}
	}

	fn session(&self) -> &Session {
		self.dispatcher.session()
	}

	fn send(&self, packet: Packet) -> anyhow::Result<()> {
		self.tx.send(packet).map_err(|_| anyhow::anyhow!("{} peer is gone", self.name))
	}

	// Write every queued control frame to the control stream.
	fn flush(&mut self) -> anyhow::Result<()> {
		let mut data = BytesMut::new();
		if !self.control_open {
			StreamType::CONTROL.encode(&mut data, ())?;
			self.control_open = true;
		}

		let session = self.dispatcher.session().clone();
		while let Some((token, buf)) = session.poll_send() {
			data.extend_from_slice(&buf);
			session.send_complete(token);
		}

		if !data.is_empty() {
			self.send(Packet::Stream {
				id: CONTROL_STREAM,
				data: data.freeze(),
				fin: false,
			})?;
		}

		Ok(())
	}

	fn receive(&mut self, packet: Packet) -> anyhow::Result<Vec<Event>> {
		let events = match packet {
			Packet::Stream { id, data, fin } => self.dispatcher.on_stream_bytes(id, &data, fin)?,
			Packet::Datagram(data) => vec![self.dispatcher.on_datagram(data)?],
		};

		for event in &events {
			tracing::debug!(side = self.name, ?event, "event");
			self.lines.push(format!("{}: {}", self.name, describe(event)));
		}

		Ok(events)
	}

	fn open_stream(&mut self) -> u64 {
		let id = self.next_stream;
		self.next_stream += 4;
		id
	}
}

fn describe(event: &Event) -> String {
	match event {
		Event::Object { request_id, object } => format!(
			"object request={} group={} object={} payload={:?}",
			request_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
			object.group_id,
			object.object_id,
			String::from_utf8_lossy(&object.payload),
		),
		Event::Datagram { datagram, .. } => format!(
			"datagram group={} object={} payload={:?}",
			datagram.object.group_id,
			datagram.object.object_id,
			String::from_utf8_lossy(&datagram.object.payload),
		),
		Event::Request(request) => format!("request {} {:?}", request.request_id(), request),
		other => format!("{other:?}"),
	}
}

/// Run a client and a server against each other over in-memory channels.
///
/// The client subscribes to and fetches a track; the server answers with a subgroup stream, a
/// datagram and a fetch stream, then ends the subscription. Returns one line per event.
pub async fn run(args: LoopbackArgs, session: SessionArgs) -> anyhow::Result<Vec<String>> {
	let (to_server, from_client) = mpsc::unbounded_channel();
	let (to_client, from_server) = mpsc::unbounded_channel();

	let client = Endpoint::new("client", Session::new(session.session_config(Role::Client)), to_server);
	let server = Endpoint::new("server", Session::new(session.session_config(Role::Server)), to_client);

	let server = tokio::spawn(serve(server, from_client, args.clone()));
	let client = tokio::time::timeout(args.timeout, drive(client, from_server, args.clone()))
		.await
		.context("loopback timed out")??;

	let server = tokio::time::timeout(args.timeout, server)
		.await
		.context("server timed out")?
		.context("server task failed")??;

	let mut lines = client;
	lines.extend(server);
	Ok(lines)
}

async fn drive(
	mut client: Endpoint,
	mut rx: mpsc::UnboundedReceiver<Packet>,
	args: LoopbackArgs,
) -> anyhow::Result<Vec<String>> {
	client.session().connect()?;
	client.flush()?;

	let namespace = TrackNamespace::from_path(&args.namespace);
	let last = Location::new(0, args.objects.saturating_sub(1));

	let mut subscribe_done = false;
	let mut fetch_done = false;

	while let Some(packet) = rx.recv().await {
		for event in client.receive(packet)? {
			match event {
				Event::Established { version } => {
					tracing::info!(?version, "client established");

					client
						.session()
						.subscribe(namespace.clone(), args.track.clone(), Default::default())?;
					client.session().fetch(
						namespace.clone(),
						args.track.clone(),
						Location::new(0, 0),
						last,
						Default::default(),
					)?;
				}
				Event::PublishDone { .. } => subscribe_done = true,
				Event::FetchComplete { .. } => fetch_done = true,
				Event::Rejected { .. } => anyhow::bail!("request rejected: {event:?}"),
				Event::Closed { code } => anyhow::bail!("session closed early: {code}"),
				_ => {}
			}
		}

		client.flush()?;

		if subscribe_done && fetch_done {
			break;
		}
	}

	// Finishing the control stream ends the session.
	client.send(Packet::Stream {
		id: CONTROL_STREAM,
		data: Bytes::new(),
		fin: true,
	})?;

	Ok(client.lines)
}

async fn serve(
	mut server: Endpoint,
	mut rx: mpsc::UnboundedReceiver<Packet>,
	args: LoopbackArgs,
) -> anyhow::Result<Vec<String>> {
	while let Some(packet) = rx.recv().await {
		for event in server.receive(packet)? {
			match event {
				Event::Request(IncomingRequest::Subscribe(msg)) => {
					server.session().accept(msg.request_id, Default::default())?;
					server.flush()?;

					publish(&mut server, msg.track_alias, args.objects)?;
					server
						.session()
						.publish_done(msg.request_id, PublishDoneCode::TrackEnded, "loopback finished")?;
				}
				Event::Request(IncomingRequest::Fetch(msg)) => {
					server.session().accept(msg.request_id, Default::default())?;
					server.flush()?;

					let id = server.open_stream();
					let mut writer = FetchWriter::new(msg.request_id);
					let mut data = BytesMut::new();
					writer.encode_header(&mut data)?;
					for object_id in msg.start.object..=msg.end.object {
						writer.encode_object(&mut data, &object(0, msg.start.group, object_id))?;
					}

					server.send(Packet::Stream {
						id,
						data: data.freeze(),
						fin: true,
					})?;
				}
				Event::Request(request) => {
					server
						.session()
						.reject(request.request_id(), ErrorCode::Internal, "not supported")?;
				}
				Event::Closed { .. } => return Ok(server.lines),
				_ => {}
			}
		}

		server.flush()?;
	}

	Ok(server.lines)
}

fn object(track_alias: u64, group_id: u64, object_id: u64) -> Object {
	Object {
		track_alias,
		group_id,
		object_id,
		publisher_priority: Some(128),
		payload: format!("object {object_id}").into(),
		..Default::default()
	}
}

// Send the group on one subgroup stream, and one extra object as a datagram.
fn publish(server: &mut Endpoint, track_alias: u64, objects: u64) -> anyhow::Result<()> {
	let mut writer = SubgroupWriter::new(SubgroupHeader {
		track_alias,
		group_id: 0,
		subgroup_id: SubgroupId::Zero,
		publisher_priority: Some(128),
		has_extensions: false,
		has_end: true,
	});

	let mut data = BytesMut::new();
	writer.encode_header(&mut data)?;
	for object_id in 0..objects {
		writer.encode_object(&mut data, &object(track_alias, 0, object_id))?;
	}

	let id = server.open_stream();
	server.send(Packet::Stream {
		id,
		data: data.freeze(),
		fin: true,
	})?;

	let mut datagram = Datagram::new(object(track_alias, 1, 0));
	datagram.end_of_group = true;
	server.send(Packet::Datagram(datagram.encode_bytes()?))?;

	Ok(())
}
