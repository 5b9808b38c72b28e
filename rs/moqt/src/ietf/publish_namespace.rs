//! Namespace announcement: PUBLISH_NAMESPACE, PUBLISH_NAMESPACE_DONE and PUBLISH_NAMESPACE_CANCEL.

use crate::{
	coding::*,
	ietf::{Message, MessageParameters, RequestId, TrackNamespace},
};

/// PublishNamespace message (0x06)
/// Sent by the publisher to announce the availability of a namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishNamespace {
	pub request_id: RequestId,
	pub track_namespace: TrackNamespace,
	pub parameters: MessageParameters,
}

impl Message for PublishNamespace {
	const ID: u64 = 0x06;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.track_namespace.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let track_namespace = TrackNamespace::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;

		Ok(Self {
			request_id,
			track_namespace,
			parameters,
		})
	}
}

/// PublishNamespaceDone message (0x09)
/// Sent by the publisher when it stops publishing a namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishNamespaceDone {
	pub request_id: RequestId,
	pub status_code: u64,
	pub reason_phrase: String,
}

impl Message for PublishNamespaceDone {
	const ID: u64 = 0x09;

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

/// PublishNamespaceCancel message (0x0c)
/// Sent by the subscriber to withdraw interest in an announced namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishNamespaceCancel {
	pub request_id: RequestId,
}

impl Message for PublishNamespaceCancel {
	const ID: u64 = 0x0c;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		Ok(Self { request_id })
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
	fn publish_namespace_wire() {
		let msg = PublishNamespace {
			request_id: RequestId(1),
			track_namespace: TrackNamespace::from(["test", "room"]),
			parameters: MessageParameters::default(),
		};

		#[rustfmt::skip]
		let expected = vec![
			0x01, // request_id
			0x02, // 2 fields
			0x04, b't', b'e', b's', b't',
			0x04, b'r', b'o', b'o', b'm',
			0x00, // parameters
		];

		let encoded = encode_message(&msg);
		assert_eq!(encoded, expected);
		assert_eq!(decode_message::<PublishNamespace>(&encoded).unwrap(), msg);
	}

	#[test]
	fn publish_namespace_done() {
		let msg = PublishNamespaceDone {
			request_id: RequestId(5),
			status_code: 0,
			reason_phrase: String::new(),
		};
		let encoded = encode_message(&msg);
		assert_eq!(encoded, vec![0x05, 0x00, 0x00]);
		assert_eq!(decode_message::<PublishNamespaceDone>(&encoded).unwrap(), msg);
	}

	#[test]
	fn namespace_too_long() {
		let mut wire = vec![0x01, 33];
		for _ in 0..33 {
			wire.extend_from_slice(&[0x01, b'x']);
		}
		wire.push(0x00);

		assert_eq!(decode_message::<PublishNamespace>(&wire), Err(DecodeError::TooMany));
	}
}
