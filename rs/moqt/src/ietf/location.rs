use std::fmt;

use crate::coding::*;

/// A position within a track: a group and an object within that group.
///
/// Ordering is by group, then by object.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
	pub group: u64,
	pub object: u64,
}

impl Location {
	pub const fn new(group: u64, object: u64) -> Self {
		Self { group, object }
	}
}

impl fmt::Debug for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.group, self.object)
	}
}

impl<V: Clone> Encode<V> for Location {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		self.group.encode(w, version.clone())?;
		self.object.encode(w, version)
	}
}

impl<V: Clone> Decode<V> for Location {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let group = u64::decode(r, version.clone())?;
		let object = u64::decode(r, version)?;
		Ok(Self { group, object })
	}
}
