//! TRACK_STATUS and its status codes.

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
	coding::*,
	ietf::{Message, MessageParameters, RequestId, TrackNamespace},
};

/// TrackStatus message (0x0d)
/// Asks the publisher about a track without subscribing to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackStatus {
	pub request_id: RequestId,
	pub track_namespace: TrackNamespace,
	pub track_name: Bytes,
	pub parameters: MessageParameters,
}

impl Message for TrackStatus {
	const ID: u64 = 0x0d;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.track_namespace.encode(w, version)?;
		self.track_name.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let track_namespace = TrackNamespace::decode(r, version)?;
		let track_name = Bytes::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;

		Ok(Self {
			request_id,
			track_namespace,
			track_name,
			parameters,
		})
	}
}

/// The state of a track, as reported in reply to [TrackStatus].
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum TrackStatusCode {
	InProgress = 0x00,
	DoesNotExist = 0x01,
	NotYetBegun = 0x02,
	Finished = 0x03,
}

impl TrackStatusCode {
	/// Whether the reply should carry the largest location.
	pub fn has_largest(&self) -> bool {
		matches!(self, Self::InProgress | Self::Finished)
	}
}

impl<V> Encode<V> for TrackStatusCode {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		u64::from(*self).encode(w, version)
	}
}

impl<V> Decode<V> for TrackStatusCode {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r, version)?).map_err(|_| DecodeError::InvalidValue)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::BytesMut;

	#[test]
	fn track_status_round_trip() {
		let msg = TrackStatus {
			request_id: RequestId(8),
			track_namespace: TrackNamespace::from(["live"]),
			track_name: Bytes::from_static(b"video"),
			parameters: MessageParameters::default(),
		};

		let mut buf = BytesMut::new();
		msg.encode_msg(&mut buf, Version::DRAFT_15).unwrap();

		let mut bytes = buf.freeze();
		let decoded = TrackStatus::decode_msg(&mut bytes, Version::DRAFT_15).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn status_codes() {
		let mut buf = Bytes::from_static(&[0x03]);
		assert_eq!(TrackStatusCode::decode(&mut buf, ()).unwrap(), TrackStatusCode::Finished);
		assert!(TrackStatusCode::Finished.has_largest());
		assert!(!TrackStatusCode::NotYetBegun.has_largest());

		let mut buf = Bytes::from_static(&[0x04]);
		assert_eq!(TrackStatusCode::decode(&mut buf, ()), Err(DecodeError::InvalidValue));
	}
}
