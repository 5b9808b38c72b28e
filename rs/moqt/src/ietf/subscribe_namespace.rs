//! SUBSCRIBE_NAMESPACE and UNSUBSCRIBE_NAMESPACE.

use crate::{
	coding::*,
	ietf::{Message, MessageParameters, RequestId, TrackNamespace},
};

/// SubscribeNamespace message (0x11)
/// Asks the publisher for every namespace announcement under a prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeNamespace {
	pub request_id: RequestId,
	pub namespace_prefix: TrackNamespace,
	pub parameters: MessageParameters,
}

impl Message for SubscribeNamespace {
	const ID: u64 = 0x11;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.namespace_prefix.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let namespace_prefix = TrackNamespace::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;

		Ok(Self {
			request_id,
			namespace_prefix,
			parameters,
		})
	}
}

/// UnsubscribeNamespace message (0x14)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsubscribeNamespace {
	pub request_id: RequestId,
}

impl Message for UnsubscribeNamespace {
	const ID: u64 = 0x14;

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

	#[test]
	fn subscribe_namespace_round_trip() {
		let msg = SubscribeNamespace {
			request_id: RequestId(10),
			namespace_prefix: TrackNamespace::from(["live"]),
			parameters: MessageParameters::default(),
		};

		let mut buf = BytesMut::new();
		msg.encode_msg(&mut buf, Version::DRAFT_15).unwrap();
		assert_eq!(buf.as_ref(), &[0x0a, 0x01, 0x04, b'l', b'i', b'v', b'e', 0x00]);

		let mut bytes = buf.freeze();
		let decoded = SubscribeNamespace::decode_msg(&mut bytes, Version::DRAFT_15).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn empty_prefix() {
		let msg = SubscribeNamespace {
			request_id: RequestId(0),
			namespace_prefix: TrackNamespace::default(),
			parameters: MessageParameters::default(),
		};

		let mut buf = BytesMut::new();
		msg.encode_msg(&mut buf, Version::DRAFT_15).unwrap();

		let mut bytes = buf.freeze();
		let decoded = SubscribeNamespace::decode_msg(&mut bytes, Version::DRAFT_15).unwrap();
		assert!(decoded.namespace_prefix.is_empty());
	}
}
