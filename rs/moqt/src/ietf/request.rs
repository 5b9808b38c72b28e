use num_enum::{FromPrimitive, IntoPrimitive};

use crate::{
	coding::*,
	ietf::{Message, MessageParameters},
};

/// A connection-scoped identifier correlating a request with its response.
///
/// Each side allocates from its own parity: even for the client, odd for the server.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestId(pub u64);

impl RequestId {
	/// Return the current id and advance to the next one of the same parity.
	pub fn increment(&mut self) -> RequestId {
		let prev = self.0;
		self.0 += 2;
		RequestId(prev)
	}
}

impl std::fmt::Display for RequestId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl<V> Encode<V> for RequestId {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		self.0.encode(w, version)
	}
}

impl<V> Decode<V> for RequestId {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r, version)?;
		Ok(Self(request_id))
	}
}

/// Session and request error codes.
#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum ErrorCode {
	NoError = 0x0,
	Internal = 0x1,
	Unauthorized = 0x2,
	ProtocolViolation = 0x3,
	DuplicateTrackAlias = 0x4,
	ParameterLengthMismatch = 0x5,
	TooManySubscribers = 0x6,
	GoawayTimeout = 0x10,
	#[num_enum(catch_all)]
	Other(u64),
}

/// Raises the maximum request id the peer may use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaxRequestId {
	pub request_id: RequestId,
}

impl Message for MaxRequestId {
	const ID: u64 = 0x15;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		Ok(Self { request_id })
	}
}

/// Sent when a new request could not be issued because of the peer's limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestsBlocked {
	pub maximum: RequestId,
}

impl Message for RequestsBlocked {
	const ID: u64 = 0x1a;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.maximum.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let maximum = RequestId::decode(r, version)?;
		Ok(Self { maximum })
	}
}

/// Generic success response for any request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOk {
	pub request_id: RequestId,
	pub parameters: MessageParameters,
}

impl Message for RequestOk {
	const ID: u64 = 0x07;

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

/// Generic failure response for any request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestError {
	pub request_id: RequestId,
	pub error_code: u64,
	pub reason_phrase: String,
}

impl Message for RequestError {
	const ID: u64 = 0x05;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.error_code.encode(w, version)?;
		self.reason_phrase.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let error_code = u64::decode(r, version)?;
		let reason_phrase = String::decode(r, version)?;

		Ok(Self {
			request_id,
			error_code,
			reason_phrase,
		})
	}
}
