use std::{fmt::Debug, io};

use bytes::{Buf, BufMut, Bytes};

use crate::{
	coding::*,
	ietf::{
		ClientSetup, Fetch, FetchCancel, FetchOk, GoAway, MaxRequestId, Publish, PublishDone, PublishNamespace,
		PublishNamespaceCancel, PublishNamespaceDone, PublishOk, RequestError, RequestOk, RequestsBlocked, ServerSetup,
		Subscribe, SubscribeNamespace, SubscribeOk, SubscribeUpdate, TrackStatus, Unsubscribe, UnsubscribeNamespace,
	},
};

/// A control message body, identified on the wire by [Message::ID].
///
/// The framing (type + length) is handled by [encode_frame] and [ControlMessage].
pub trait Message: Sized + Debug {
	const ID: u64;

	fn encode_msg<W: BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError>;
	fn decode_msg<R: Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError>;
}

/// Encode the type, the length, and then the body of a message.
pub fn encode_frame<M: Message, W: BufMut>(msg: &M, w: &mut W, version: Version) -> Result<(), EncodeError> {
	let mut body: Vec<u8> = Vec::new();
	msg.encode_msg(&mut body, version)?;

	M::ID.encode(w, version)?;
	body.len().encode(w, version)?;
	w.put_slice(&body);

	Ok(())
}

/// Decode a message body that has already been split off by its declared length.
///
/// The body must be consumed exactly; running out of bytes or leaving some behind is malformed.
pub fn decode_body<M: Message>(mut body: Bytes, version: Version) -> Result<M, DecodeError> {
	let msg = match M::decode_msg(&mut body, version) {
		Err(DecodeError::Truncated) => return Err(DecodeError::Malformed),
		res => res?,
	};

	if body.has_remaining() {
		return Err(DecodeError::Malformed);
	}

	Ok(msg)
}

macro_rules! control_messages {
	{$($name:ident,)*} => {
		/// Any control message, or an unknown one that was skipped.
		#[derive(Debug, Clone, PartialEq, Eq)]
		pub enum ControlMessage {
			$($name($name),)*

			/// A message type we don't understand, preserved so the stream stays in sync.
			Unknown { id: u64, payload: Bytes },
		}

		impl ControlMessage {
			/// The wire type of this message.
			pub fn id(&self) -> u64 {
				match self {
					$(Self::$name(_) => $name::ID,)*
					Self::Unknown { id, .. } => *id,
				}
			}

			/// Encode the full frame: type, length and body.
			pub fn encode<W: BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
				match self {
					$(Self::$name(m) => encode_frame(m, w, version),)*
					Self::Unknown { id, payload } => {
						id.encode(w, version)?;
						payload.encode(w, version)
					}
				}
			}

			fn decode_known(id: u64, body: Bytes, version: Version) -> Option<Result<Self, DecodeError>> {
				match id {
					$($name::ID => Some(decode_body::<$name>(body, version).map(Self::$name)),)*
					_ => None,
				}
			}
		}

		$(impl From<$name> for ControlMessage {
			fn from(m: $name) -> Self {
				Self::$name(m)
			}
		})*
	}
}

control_messages! {
	ClientSetup,
	ServerSetup,
	GoAway,
	MaxRequestId,
	RequestsBlocked,
	RequestOk,
	RequestError,
	Subscribe,
	SubscribeOk,
	SubscribeUpdate,
	Unsubscribe,
	Publish,
	PublishOk,
	PublishDone,
	Fetch,
	FetchOk,
	FetchCancel,
	TrackStatus,
	PublishNamespace,
	PublishNamespaceDone,
	PublishNamespaceCancel,
	SubscribeNamespace,
	UnsubscribeNamespace,
}

impl ControlMessage {
	pub fn encode_bytes(&self, version: Version) -> Result<Bytes, EncodeError> {
		let mut buf = bytes::BytesMut::new();
		self.encode(&mut buf, version)?;
		Ok(buf.freeze())
	}
}

/// Decodes control frames from the front of a buffer.
#[derive(Debug, Clone, Copy)]
pub struct ControlDecoder {
	pub version: Version,

	/// Skip unknown message types instead of failing with [DecodeError::UnknownMessageType].
	pub skip_unknown: bool,
}

impl ControlDecoder {
	pub fn new(version: Version) -> Self {
		Self {
			version,
			skip_unknown: true,
		}
	}

	/// Decode one frame from `r`.
	///
	/// Returns [DecodeError::Truncated] without a meaningful position if the frame is incomplete.
	pub fn decode<R: Buf>(&self, r: &mut R) -> Result<ControlMessage, DecodeError> {
		let id = u64::decode(r, self.version)?;
		let size = usize::decode(r, self.version)?;
		let body = decode_exact(r, size)?;

		match ControlMessage::decode_known(id, body.clone(), self.version) {
			Some(res) => res,
			None if self.skip_unknown => Ok(ControlMessage::Unknown { id, payload: body }),
			None => Err(DecodeError::UnknownMessageType(id)),
		}
	}

	/// Decode one frame from the front of `buf` without consuming it.
	pub fn try_decode_next(&self, buf: &[u8]) -> Result<Decoded<ControlMessage>, DecodeError> {
		let mut cursor = io::Cursor::new(buf);
		match self.decode(&mut cursor) {
			Ok(msg) => Ok(Decoded::Item(msg, cursor.position() as usize)),
			Err(DecodeError::Truncated) => Ok(Decoded::NeedMoreBytes),
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ietf::{
		Location, MessageParameters, ParameterBytes, ParameterVarInt, Parameters, RequestId, TrackNamespace,
	};
	use proptest::prelude::*;

	fn subscribe() -> Subscribe {
		let mut parameters = MessageParameters::default();
		parameters.set_subscriber_priority(0);

		Subscribe {
			request_id: RequestId(1),
			track_alias: 7,
			track_namespace: TrackNamespace::from(["a"]),
			track_name: "video".into(),
			parameters,
		}
	}

	#[test]
	fn subscribe_frame() {
		let msg = ControlMessage::from(subscribe());
		let encoded = msg.encode_bytes(Version::DRAFT_15).unwrap();

		let mut body: Vec<u8> = Vec::new();
		subscribe().encode_msg(&mut body, Version::DRAFT_15).unwrap();

		let decoder = ControlDecoder::new(Version::DRAFT_15);
		match decoder.try_decode_next(&encoded).unwrap() {
			Decoded::Item(decoded, consumed) => {
				assert_eq!(decoded, msg);
				assert_eq!(consumed, 2 + body.len());
				assert_eq!(consumed, encoded.len());
			}
			Decoded::NeedMoreBytes => panic!("complete frame"),
		}
	}

	#[test]
	fn every_prefix_is_truncated() {
		let encoded = ControlMessage::from(subscribe()).encode_bytes(Version::DRAFT_15).unwrap();
		let decoder = ControlDecoder::new(Version::DRAFT_15);

		for len in 0..encoded.len() {
			let mut buf = encoded.slice(..len);
			assert_eq!(decoder.decode(&mut buf), Err(DecodeError::Truncated), "prefix {len}");
			assert_eq!(decoder.try_decode_next(&encoded[..len]), Ok(Decoded::NeedMoreBytes));
		}
	}

	fn parameters_strategy() -> impl Strategy<Value = MessageParameters> {
		(
			any::<Option<u8>>(),
			proptest::option::of(0u64..1 << 40),
			proptest::option::of(proptest::collection::vec(any::<u8>(), 0..8)),
		)
			.prop_map(|(priority, timeout, token)| {
				let mut parameters = MessageParameters::default();
				if let Some(priority) = priority {
					parameters.set_subscriber_priority(priority);
				}
				if let Some(timeout) = timeout {
					parameters.set_delivery_timeout(timeout);
				}
				if let Some(token) = token {
					parameters.set_authorization_token(token);
				}
				parameters
			})
	}

	fn setup_strategy() -> impl Strategy<Value = Parameters> {
		(proptest::option::of("/[a-z]{0,8}"), proptest::option::of(0u64..1 << 20)).prop_map(|(path, max)| {
			let mut parameters = Parameters::default();
			if let Some(path) = path {
				parameters.set_bytes(ParameterBytes::Path, path);
			}
			if let Some(max) = max {
				parameters.set_varint(ParameterVarInt::MaxRequestId, max);
			}
			parameters
		})
	}

	// Every message type, with fields drawn from a shared pool.
	fn message_strategy() -> impl Strategy<Value = ControlMessage> {
		let namespace =
			proptest::collection::vec("[a-z]{1,4}", 1..4).prop_map(|fields| TrackNamespace::from(fields.as_slice()));
		let location = (0u64..1 << 30, 0u64..1 << 30).prop_map(|(group, object)| Location::new(group, object));

		(
			0..23usize,
			(0u64..1 << 30).prop_map(RequestId),
			0u64..1 << 30,
			namespace,
			"[a-z]{0,8}",
			parameters_strategy(),
			setup_strategy(),
			"[ -~]{0,16}",
			0u64..0x20,
			(location.clone(), location),
		)
			.prop_map(
				|(kind, request_id, track_alias, track_namespace, name, parameters, setup, reason_phrase, code, range)| -> ControlMessage {
					let track_name = Bytes::from(name);
					let (start, end) = if range.0 <= range.1 { range } else { (range.1, range.0) };

					match kind {
						0 => ClientSetup {
							versions: [Version::DRAFT_15].into(),
							parameters: setup,
						}
						.into(),
						1 => ServerSetup {
							version: Version::DRAFT_15,
							parameters: setup,
						}
						.into(),
						2 => GoAway {
							new_session_uri: reason_phrase,
						}
						.into(),
						3 => MaxRequestId { request_id }.into(),
						4 => RequestsBlocked { maximum: request_id }.into(),
						5 => RequestOk { request_id, parameters }.into(),
						6 => RequestError {
							request_id,
							error_code: code,
							reason_phrase,
						}
						.into(),
						7 => Subscribe {
							request_id,
							track_alias,
							track_namespace,
							track_name,
							parameters,
						}
						.into(),
						8 => SubscribeOk { request_id, parameters }.into(),
						9 => SubscribeUpdate { request_id, parameters }.into(),
						10 => Unsubscribe { request_id }.into(),
						11 => Publish {
							request_id,
							track_alias,
							track_namespace,
							track_name,
							parameters,
						}
						.into(),
						12 => PublishOk { request_id, parameters }.into(),
						13 => PublishDone {
							request_id,
							status_code: code,
							reason_phrase,
						}
						.into(),
						14 => Fetch {
							request_id,
							track_namespace,
							track_name,
							start,
							end,
							parameters,
						}
						.into(),
						15 => FetchOk { request_id, parameters }.into(),
						16 => FetchCancel { request_id }.into(),
						17 => TrackStatus {
							request_id,
							track_namespace,
							track_name,
							parameters,
						}
						.into(),
						18 => PublishNamespace {
							request_id,
							track_namespace,
							parameters,
						}
						.into(),
						19 => PublishNamespaceDone {
							request_id,
							status_code: code,
							reason_phrase,
						}
						.into(),
						20 => PublishNamespaceCancel { request_id }.into(),
						21 => SubscribeNamespace {
							request_id,
							namespace_prefix: track_namespace,
							parameters,
						}
						.into(),
						_ => UnsubscribeNamespace { request_id }.into(),
					}
				},
			)
	}

	proptest! {
		#[test]
		fn any_message_prefix_is_truncated(msg in message_strategy()) {
			let encoded = msg.encode_bytes(Version::DRAFT_15).unwrap();
			let decoder = ControlDecoder::new(Version::DRAFT_15);

			for len in 0..encoded.len() {
				let mut buf = encoded.slice(..len);
				prop_assert_eq!(decoder.decode(&mut buf), Err(DecodeError::Truncated), "prefix {}", len);
			}

			let mut buf = encoded.clone();
			prop_assert_eq!(decoder.decode(&mut buf), Ok(msg));
			prop_assert!(buf.is_empty());
		}
	}

	#[test]
	fn length_mismatch() {
		// UNSUBSCRIBE declaring 2 bytes but the request id only needs 1.
		let mut buf = Bytes::from_static(&[0x0a, 0x02, 0x05, 0x00]);
		let decoder = ControlDecoder::new(Version::DRAFT_15);
		assert_eq!(decoder.decode(&mut buf), Err(DecodeError::Malformed));

		// UNSUBSCRIBE declaring 1 byte but the request id needs 2.
		let mut buf = Bytes::from_static(&[0x0a, 0x01, 0x40, 0x05]);
		assert_eq!(decoder.decode(&mut buf), Err(DecodeError::Malformed));
	}

	#[test]
	fn unknown_type() {
		let wire = [0x3f, 0x03, 0xaa, 0xbb, 0xcc, 0x0a, 0x01, 0x04];

		let mut decoder = ControlDecoder::new(Version::DRAFT_15);
		let mut buf = Bytes::copy_from_slice(&wire);
		let msg = decoder.decode(&mut buf).unwrap();
		assert_eq!(
			msg,
			ControlMessage::Unknown {
				id: 0x3f,
				payload: Bytes::from_static(&[0xaa, 0xbb, 0xcc])
			}
		);

		// The stream stays in sync after skipping.
		let next = decoder.decode(&mut buf).unwrap();
		assert_eq!(
			next,
			ControlMessage::Unsubscribe(Unsubscribe {
				request_id: RequestId(4)
			})
		);

		// Re-encoding an unknown message reproduces it.
		assert_eq!(msg.encode_bytes(Version::DRAFT_15).unwrap().as_ref(), &wire[..5]);

		decoder.skip_unknown = false;
		let mut buf = Bytes::copy_from_slice(&wire);
		assert_eq!(decoder.decode(&mut buf), Err(DecodeError::UnknownMessageType(0x3f)));
	}
}
