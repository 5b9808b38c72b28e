use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
	Error, Result,
	coding::Reader,
	config::StreamEndPolicy,
	data::{Datagram, ExtensionPolicy, FetchReader, StreamType, SubgroupReader},
	ietf::{ControlDecoder, ErrorCode},
	session::{Event, Session},
};

// The decoder chosen by the first varint on a stream.
enum Decoder {
	Control(ControlDecoder),
	Subgroup(SubgroupReader),
	Fetch(FetchReader),

	// Decoding failed; the rest of the stream is dropped until FIN or reset.
	Failed,
}

// Everything we know about a single incoming stream.
struct Stream {
	buffer: Reader<()>,
	decoder: Option<Decoder>,
}

impl Default for Stream {
	fn default() -> Self {
		Self {
			buffer: Reader::new(()),
			decoder: None,
		}
	}
}

#[derive(Default)]
struct Streams {
	lookup: HashMap<u64, Arc<Mutex<Stream>>>,
	control: Option<u64>,
}

/// Routes the bytes received on each stream, and each datagram, to the right decoder.
///
/// Each stream is locked on its own, so streams can be fed concurrently from separate tasks.
/// Only control messages and request lookups go through the [Session] lock.
#[derive(Clone)]
pub struct Dispatcher {
	session: Session,
	streams: Arc<Mutex<Streams>>,

	extension_policy: ExtensionPolicy,
	stream_end_policy: StreamEndPolicy,
	skip_unknown: bool,
}

impl Dispatcher {
	pub fn new(session: Session) -> Self {
		let config = session.config();

		Self {
			session,
			streams: Default::default(),
			extension_policy: config.extension_policy,
			stream_end_policy: config.stream_end_policy,
			skip_unknown: config.skip_unknown_messages,
		}
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	/// The number of streams that haven't finished or been reset, including failed ones.
	pub fn active_streams(&self) -> usize {
		self.streams.lock().lookup.len()
	}

	/// Feed a chunk received on a stream, returning every event it completes.
	///
	/// `is_final` marks the end of the stream; any partial item left in the buffer is malformed.
	/// After an error the stream keeps its type: later chunks are dropped until it finishes or is reset.
	pub fn on_stream_bytes(&self, stream_id: u64, chunk: &[u8], is_final: bool) -> Result<Vec<Event>> {
		tracing::trace!(stream_id, size = chunk.len(), is_final, "stream bytes");

		let stream = self.streams.lock().lookup.entry(stream_id).or_insert_with(Default::default).clone();

		let res = {
			let mut stream = stream.lock();
			let res = self.process(stream_id, &mut stream, chunk, is_final);

			if let Err(err) = &res {
				tracing::debug!(stream_id, %err, "dropping stream");
				stream.buffer.clear();
				stream.decoder = Some(Decoder::Failed);
			}

			res
		};

		if is_final {
			self.streams.lock().lookup.remove(&stream_id);
		}

		res
	}

	/// The peer reset a stream: discard its residue and fail whatever depended on it.
	pub fn on_stream_reset(&self, stream_id: u64, code: u64) -> Vec<Event> {
		let Some(stream) = self.streams.lock().lookup.remove(&stream_id) else {
			return Vec::new();
		};

		let mut stream = stream.lock();
		stream.buffer.clear();

		match &stream.decoder {
			Some(Decoder::Control(_)) => {
				tracing::warn!(stream_id, code, "control stream reset");
				self.session.close(code);
				vec![Event::Closed { code }]
			}
			Some(Decoder::Fetch(reader)) => match reader.request_id() {
				Some(request_id) => self.session.fetch_failed(request_id, code).into_iter().collect(),
				None => Vec::new(),
			},
			Some(Decoder::Subgroup(_) | Decoder::Failed) | None => {
				tracing::debug!(stream_id, code, "stream reset");
				Vec::new()
			}
		}
	}

	/// Decode a single object datagram.
	pub fn on_datagram(&self, payload: Bytes) -> Result<Event> {
		let datagram = Datagram::decode(payload, self.extension_policy)?;
		let request_id = self.session.alias_request(datagram.object.track_alias);

		Ok(Event::Datagram { request_id, datagram })
	}

	fn process(&self, stream_id: u64, stream: &mut Stream, chunk: &[u8], is_final: bool) -> Result<Vec<Event>> {
		let Stream { buffer, decoder } = stream;

		if matches!(decoder, Some(Decoder::Failed)) {
			tracing::trace!(stream_id, size = chunk.len(), "discarding bytes on failed stream");
			return Ok(Vec::new());
		}

		buffer.push(chunk);

		if decoder.is_none() {
			if let Some(kind) = buffer.decode::<u64>()? {
				*decoder = Some(self.decoder(stream_id, kind)?);
			}
		}

		let mut events = match decoder {
			Some(decoder) => self.drain(buffer, decoder)?,
			None => Vec::new(),
		};

		if is_final {
			buffer.finish()?;

			if let Some(decoder) = decoder {
				events.extend(self.finish(stream_id, decoder));
			}
		}

		Ok(events)
	}

	fn decoder(&self, stream_id: u64, kind: u64) -> Result<Decoder> {
		let decoder = match StreamType::try_from(kind).map_err(Error::UnexpectedStream)? {
			StreamType::Control => {
				let mut streams = self.streams.lock();
				if streams.control.is_some_and(|id| id != stream_id) {
					return Err(Error::ProtocolViolation("duplicate control stream"));
				}
				streams.control = Some(stream_id);

				Decoder::Control(ControlDecoder {
					version: self.session.version(),
					skip_unknown: self.skip_unknown,
				})
			}
			StreamType::Subgroup(kind) => Decoder::Subgroup(SubgroupReader::with_type(kind, self.extension_policy)),
			StreamType::Fetch => Decoder::Fetch(FetchReader::with_type(self.extension_policy)),
		};

		tracing::debug!(stream_id, kind, "new stream");

		Ok(decoder)
	}

	fn drain(&self, buffer: &mut Reader<()>, decoder: &mut Decoder) -> Result<Vec<Event>> {
		let mut events = Vec::new();

		match decoder {
			Decoder::Control(decoder) => loop {
				let msg = match buffer.decode_with(|buf| decoder.try_decode_next(buf)) {
					Ok(Some(msg)) => msg,
					Ok(None) => break,
					Err(err) => {
						// The control stream can't resynchronize.
						let err = Error::from(err);
						tracing::warn!(%err, "malformed control stream");
						self.session.close(err.to_code());
						return Err(err);
					}
				};

				self.control(msg, &mut events)?;

				// SERVER_SETUP may have changed the version.
				decoder.version = self.session.version();
			},
			Decoder::Subgroup(reader) => {
				if buffer.decode_with(|buf| reader.try_decode_header(buf))?.is_none() {
					return Ok(events);
				}

				while let Some(object) = buffer.decode_with(|buf| reader.try_decode_next(buf))? {
					if self.is_aborted(object.track_alias) {
						tracing::trace!(alias = object.track_alias, object = object.object_id, "discarding object");
						continue;
					}

					let request_id = self.session.alias_request(object.track_alias);
					events.push(Event::Object { request_id, object });
				}
			}
			Decoder::Fetch(reader) => {
				let Some(header) = buffer.decode_with(|buf| reader.try_decode_header(buf))? else {
					return Ok(events);
				};

				while let Some(object) = buffer.decode_with(|buf| reader.try_decode_next(buf))? {
					events.push(Event::Object {
						request_id: Some(header.request_id),
						object,
					});
				}
			}
			Decoder::Failed => {}
		}

		Ok(events)
	}

	// Apply a control message, reporting per-request errors as events and closing on fatal ones.
	fn control(&self, msg: crate::ietf::ControlMessage, events: &mut Vec<Event>) -> Result<()> {
		match self.session.handle_message(msg) {
			Ok(res) => events.extend(res),
			Err(err) if err.is_fatal() => {
				tracing::warn!(%err, "fatal control message");
				self.session.close(err.to_code());
				return Err(err);
			}
			Err(err) => {
				tracing::warn!(%err, "control message failed");
				events.push(Event::Error(err));
			}
		}

		Ok(())
	}

	fn finish(&self, stream_id: u64, decoder: &Decoder) -> Vec<Event> {
		match decoder {
			Decoder::Control(_) => {
				tracing::info!(stream_id, "control stream finished");

				let code = ErrorCode::NoError.into();
				self.session.close(code);
				vec![Event::Closed { code }]
			}
			Decoder::Subgroup(reader) => match reader.header() {
				Some(header) if !self.is_aborted(header.track_alias) => vec![Event::GroupComplete {
					track_alias: header.track_alias,
					group_id: header.group_id,
				}],
				_ => Vec::new(),
			},
			Decoder::Fetch(reader) => match reader.request_id() {
				Some(request_id) => self.session.fetch_complete(request_id).into_iter().collect(),
				None => Vec::new(),
			},
			Decoder::Failed => Vec::new(),
		}
	}

	fn is_aborted(&self, alias: u64) -> bool {
		self.stream_end_policy == StreamEndPolicy::Abort && self.session.alias_closed(alias)
	}
}
