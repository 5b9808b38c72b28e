//! Fetch family: FETCH, FETCH_OK and FETCH_CANCEL.

use bytes::Bytes;

use crate::{
	coding::*,
	ietf::{Location, Message, MessageParameters, RequestId, TrackNamespace},
};

/// Fetch message (0x16)
/// Requests a past range of objects, delivered on a single fetch stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetch {
	pub request_id: RequestId,
	pub track_namespace: TrackNamespace,
	pub track_name: Bytes,
	pub start: Location,
	pub end: Location,
	pub parameters: MessageParameters,
}

impl Message for Fetch {
	const ID: u64 = 0x16;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		if self.end < self.start {
			return Err(EncodeError::InvalidValue);
		}

		self.request_id.encode(w, version)?;
		self.track_namespace.encode(w, version)?;
		self.track_name.encode(w, version)?;
		self.start.encode(w, version)?;
		self.end.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let track_namespace = TrackNamespace::decode(r, version)?;
		let track_name = Bytes::decode(r, version)?;
		let start = Location::decode(r, version)?;
		let end = Location::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;

		if end < start {
			return Err(DecodeError::InvalidValue);
		}

		Ok(Self {
			request_id,
			track_namespace,
			track_name,
			start,
			end,
			parameters,
		})
	}
}

/// FetchOk message (0x18)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchOk {
	pub request_id: RequestId,
	pub parameters: MessageParameters,
}

impl Message for FetchOk {
	const ID: u64 = 0x18;

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

/// FetchCancel message (0x17)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchCancel {
	pub request_id: RequestId,
}

impl Message for FetchCancel {
	const ID: u64 = 0x17;

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

	fn encode_message<M: Message>(msg: &M) -> Result<Vec<u8>, EncodeError> {
		let mut buf = BytesMut::new();
		msg.encode_msg(&mut buf, Version::DRAFT_15)?;
		Ok(buf.to_vec())
	}

	fn decode_message<M: Message>(bytes: &[u8]) -> Result<M, DecodeError> {
		let mut buf = bytes::Bytes::from(bytes.to_vec());
		M::decode_msg(&mut buf, Version::DRAFT_15)
	}

	fn fetch() -> Fetch {
		Fetch {
			request_id: RequestId(6),
			track_namespace: TrackNamespace::from(["vod"]),
			track_name: Bytes::from_static(b"v"),
			start: Location::new(1, 0),
			end: Location::new(3, 7),
			parameters: MessageParameters::default(),
		}
	}

	#[test]
	fn fetch_wire() {
		#[rustfmt::skip]
		let expected = vec![
			0x06, // request_id
			0x01, 0x03, b'v', b'o', b'd', // namespace
			0x01, b'v', // name
			0x01, 0x00, // start
			0x03, 0x07, // end
			0x00, // parameters
		];

		let encoded = encode_message(&fetch()).unwrap();
		assert_eq!(encoded, expected);
		assert_eq!(decode_message::<Fetch>(&encoded).unwrap(), fetch());
	}

	#[test]
	fn fetch_backwards_range() {
		let mut msg = fetch();
		msg.end = Location::new(0, 5);
		assert_eq!(encode_message(&msg), Err(EncodeError::InvalidValue));

		#[rustfmt::skip]
		let wire = [
			0x06,
			0x01, 0x03, b'v', b'o', b'd',
			0x01, b'v',
			0x03, 0x00,
			0x01, 0x00,
			0x00,
		];
		assert_eq!(decode_message::<Fetch>(&wire), Err(DecodeError::InvalidValue));
	}

	#[test]
	fn fetch_cancel() {
		let msg = FetchCancel {
			request_id: RequestId(300),
		};
		let encoded = encode_message(&msg).unwrap();
		assert_eq!(encoded, vec![0x41, 0x2c]);
		assert_eq!(decode_message::<FetchCancel>(&encoded).unwrap(), msg);
	}
}
