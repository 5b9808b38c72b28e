use std::string::FromUtf8Error;

use bytes::Bytes;
use thiserror::Error;

/// Read the from the buffer using the given version.
///
/// If [DecodeError::Truncated] is returned, the caller should try again with more data.
pub trait Decode<V>: Sized {
	/// Decode the value from the given buffer.
	fn decode<B: bytes::Buf>(buf: &mut B, version: V) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	/// Not enough bytes yet; recoverable by buffering.
	#[error("truncated")]
	Truncated,

	#[error("offset out of range")]
	OutOfRange,

	#[error("malformed message")]
	Malformed,

	#[error("invalid string")]
	InvalidString(#[from] FromUtf8Error),

	#[error("unknown message type: {0:#x}")]
	UnknownMessageType(u64),

	#[error("unknown extension type: {0:#x}")]
	UnknownExtensionType(u64),

	#[error("invalid value")]
	InvalidValue,

	#[error("too many")]
	TooMany,

	#[error("bounds exceeded")]
	BoundsExceeded,

	#[error("duplicate")]
	Duplicate,

	#[error("missing")]
	Missing,
}

impl<V> Decode<V> for bool {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		match u8::decode(r, version)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl<V> Decode<V> for u8 {
	fn decode<R: bytes::Buf>(r: &mut R, _: V) -> Result<Self, DecodeError> {
		match r.has_remaining() {
			true => Ok(r.get_u8()),
			false => Err(DecodeError::Truncated),
		}
	}
}

impl<V> Decode<V> for String {
	/// Decode a string with a varint length prefix.
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let v = Vec::<u8>::decode(r, version)?;
		let str = String::from_utf8(v)?;

		Ok(str)
	}
}

impl<V> Decode<V> for Vec<u8> {
	fn decode<B: bytes::Buf>(buf: &mut B, version: V) -> Result<Self, DecodeError> {
		Bytes::decode(buf, version).map(|b| b.to_vec())
	}
}

impl<V> Decode<V> for Bytes {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let len = usize::decode(r, version)?;
		if r.remaining() < len {
			return Err(DecodeError::Truncated);
		}
		Ok(r.copy_to_bytes(len))
	}
}

/// Split off exactly `size` bytes, or [DecodeError::Truncated] if not yet available.
pub(crate) fn decode_exact<R: bytes::Buf>(r: &mut R, size: usize) -> Result<Bytes, DecodeError> {
	if r.remaining() < size {
		return Err(DecodeError::Truncated);
	}
	Ok(r.copy_to_bytes(size))
}
