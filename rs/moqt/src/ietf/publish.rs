//! Publish family: PUBLISH, PUBLISH_OK and PUBLISH_DONE.

use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::{
	coding::*,
	ietf::{Message, MessageParameters, RequestId, TrackNamespace},
};

/// Publish message (0x1d)
/// Sent by the publisher to push a track to the subscriber without a prior SUBSCRIBE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publish {
	pub request_id: RequestId,
	pub track_alias: u64,
	pub track_namespace: TrackNamespace,
	pub track_name: Bytes,
	pub parameters: MessageParameters,
}

impl Message for Publish {
	const ID: u64 = 0x1d;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.track_alias.encode(w, version)?;
		self.track_namespace.encode(w, version)?;
		self.track_name.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let track_alias = u64::decode(r, version)?;
		let track_namespace = TrackNamespace::decode(r, version)?;
		let track_name = Bytes::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;

		Ok(Self {
			request_id,
			track_alias,
			track_namespace,
			track_name,
			parameters,
		})
	}
}

/// PublishOk message (0x1e)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishOk {
	pub request_id: RequestId,
	pub parameters: MessageParameters,
}

impl Message for PublishOk {
	const ID: u64 = 0x1e;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;
		Ok(Self { request_id, parameters })
	}
}

/// Why a publisher stopped sending a track.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum PublishDoneCode {
	InternalError = 0x0,
	Unauthorized = 0x1,
	TrackEnded = 0x2,
	SubscriptionEnded = 0x3,
	GoingAway = 0x4,
	Expired = 0x5,
	TooFarBehind = 0x6,
	#[num_enum(catch_all)]
	Other(u64),
}

/// PublishDone message (0x0b)
/// Sent by the publisher to end a subscription or publication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishDone {
	pub request_id: RequestId,
	pub status_code: u64,
	pub reason_phrase: String,
}

impl Message for PublishDone {
	const ID: u64 = 0x0b;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.status_code.encode(w, version)?;
		self.reason_phrase.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let status_code = u64::decode(r, version)?;
		let reason_phrase = String::decode(r, version)?;

		Ok(Self {
			request_id,
			status_code,
			reason_phrase,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::BytesMut;

	fn encode_message<M: Message>(msg: &M) -> Vec<u8> {
		let mut buf = BytesMut::new();
		msg.encode_msg(&mut buf, Version::DRAFT_15).unwrap();
		buf.to_vec()
	}

	fn decode_message<M: Message>(bytes: &[u8]) -> Result<M, DecodeError> {
		let mut buf = bytes::Bytes::from(bytes.to_vec());
		M::decode_msg(&mut buf, Version::DRAFT_15)
	}

	#[test]
	fn publish_round_trip() {
		let mut parameters = MessageParameters::default();
		parameters.set_publisher_priority(128);
		parameters.set_forward(true);

		let msg = Publish {
			request_id: RequestId(3),
			track_alias: 0,
			track_namespace: TrackNamespace::from(["live", "cam1"]),
			track_name: Bytes::from_static(b"audio"),
			parameters,
		};

		let decoded: Publish = decode_message(&encode_message(&msg)).unwrap();
		assert_eq!(decoded, msg);
		assert_eq!(decoded.parameters.publisher_priority(), Some(128));
	}

	#[test]
	fn publish_done_wire() {
		let msg = PublishDone {
			request_id: RequestId(2),
			status_code: PublishDoneCode::TrackEnded.into(),
			reason_phrase: "bye".into(),
		};

		let encoded = encode_message(&msg);
		assert_eq!(encoded, vec![0x02, 0x02, 0x03, b'b', b'y', b'e']);
		assert_eq!(decode_message::<PublishDone>(&encoded).unwrap(), msg);
		assert_eq!(PublishDoneCode::from(msg.status_code), PublishDoneCode::TrackEnded);
	}

	#[test]
	fn publish_done_invalid_utf8() {
		let bytes = [0x02, 0x02, 0x02, 0xff, 0xfe];
		assert!(matches!(
			decode_message::<PublishDone>(&bytes),
			Err(DecodeError::InvalidString(_))
		));
	}
}
