// QUIC variable-length integers, RFC 9000 section 16.

use std::fmt;

use bytes::Bytes;

use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// An integer less than 2^62, encoded in 1, 2, 4 or 8 bytes.
///
/// The two most significant bits of the first byte select the length class:
/// - `0b00` → 1 byte, 6 bits of value
/// - `0b01` → 2 bytes, 14 bits of value
/// - `0b10` → 4 bytes, 30 bits of value
/// - `0b11` → 8 bytes, 62 bits of value
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(u64);

impl VarInt {
	/// The largest representable value.
	pub const MAX: Self = Self((1 << 62) - 1);

	/// The smallest representable value.
	pub const ZERO: Self = Self(0);

	/// Construct a `VarInt` infallibly from the largest type that always fits.
	pub const fn from_u32(x: u32) -> Self {
		Self(x as u64)
	}

	/// Construct a `VarInt`, returning `None` if the value is too large.
	pub const fn from_u64(x: u64) -> Option<Self> {
		if x <= Self::MAX.0 {
			Some(Self(x))
		} else {
			None
		}
	}

	/// Extract the integer value.
	pub const fn into_inner(self) -> u64 {
		self.0
	}

	/// The number of bytes this value occupies on the wire.
	pub const fn size(self) -> usize {
		size(self.0)
	}
}

/// The minimal encoded size for `value`.
///
/// Values above [VarInt::MAX] report 8; [encode] rejects them.
pub const fn size(value: u64) -> usize {
	if value < 0x40 {
		1
	} else if value < 0x4000 {
		2
	} else if value < 0x4000_0000 {
		4
	} else {
		8
	}
}

/// Encode `value` using the shortest length class.
pub fn encode(value: u64) -> Result<Bytes, EncodeError> {
	VarInt::try_from(value)?.encode_bytes(())
}

/// Decode a varint starting at `offset`, returning the value and the number of bytes read.
pub fn decode(buf: &[u8], offset: usize) -> Result<(u64, usize), DecodeError> {
	if offset >= buf.len() {
		return Err(DecodeError::OutOfRange);
	}

	let mut slice = &buf[offset..];
	let v = VarInt::decode(&mut slice, ())?;
	Ok((v.into_inner(), buf.len() - offset - slice.len()))
}

impl From<VarInt> for u64 {
	fn from(x: VarInt) -> Self {
		x.0
	}
}

impl From<u8> for VarInt {
	fn from(x: u8) -> Self {
		Self(x.into())
	}
}

impl From<u16> for VarInt {
	fn from(x: u16) -> Self {
		Self(x.into())
	}
}

impl From<u32> for VarInt {
	fn from(x: u32) -> Self {
		Self(x.into())
	}
}

impl TryFrom<u64> for VarInt {
	type Error = EncodeError;

	fn try_from(x: u64) -> Result<Self, Self::Error> {
		Self::from_u64(x).ok_or(EncodeError::ValueTooLarge(x))
	}
}

impl TryFrom<usize> for VarInt {
	type Error = EncodeError;

	fn try_from(x: usize) -> Result<Self, Self::Error> {
		Self::try_from(x as u64)
	}
}

impl TryFrom<VarInt> for usize {
	type Error = DecodeError;

	fn try_from(x: VarInt) -> Result<Self, Self::Error> {
		usize::try_from(x.0).map_err(|_| DecodeError::BoundsExceeded)
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl<V> Decode<V> for VarInt {
	fn decode<R: bytes::Buf>(r: &mut R, _: V) -> Result<Self, DecodeError> {
		if !r.has_remaining() {
			return Err(DecodeError::Truncated);
		}

		let first = r.chunk()[0];
		let size = 1usize << (first >> 6);
		if r.remaining() < size {
			return Err(DecodeError::Truncated);
		}

		let value = match size {
			1 => r.get_u8() as u64,
			2 => (r.get_u16() & 0x3fff) as u64,
			4 => (r.get_u32() & 0x3fff_ffff) as u64,
			_ => r.get_u64() & 0x3fff_ffff_ffff_ffff,
		};

		Ok(Self(value))
	}
}

impl<V> Encode<V> for VarInt {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, _: V) -> Result<(), EncodeError> {
		let x = self.0;
		match size(x) {
			1 => w.put_u8(x as u8),
			2 => w.put_u16(0x4000 | x as u16),
			4 => w.put_u32(0x8000_0000 | x as u32),
			_ => w.put_u64(0xc000_0000_0000_0000 | x),
		}
		Ok(())
	}
}

impl<V> Encode<V> for u64 {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		VarInt::try_from(*self)?.encode(w, version)
	}
}

impl<V> Decode<V> for u64 {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		VarInt::decode(r, version).map(u64::from)
	}
}

impl<V> Encode<V> for usize {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		VarInt::try_from(*self)?.encode(w, version)
	}
}

impl<V> Decode<V> for usize {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		VarInt::decode(r, version)?.try_into()
	}
}
