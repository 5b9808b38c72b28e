use crate::coding::*;

use std::{fmt, ops::Deref};

const MAX_VERSIONS: u64 = 64;

/// A version number negotiated during the setup.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version(pub u64);

impl Version {
	/// draft-ietf-moq-transport-15
	pub const DRAFT_15: Version = Version(0xff00000f);

	/// draft-ietf-moq-transport-14
	pub const DRAFT_14: Version = Version(0xff00000e);
}

impl From<u64> for Version {
	fn from(v: u64) -> Self {
		Self(v)
	}
}

impl From<Version> for u64 {
	fn from(v: Version) -> Self {
		v.0
	}
}

impl<V> Decode<V> for Version {
	/// Decode the version number.
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let v = u64::decode(r, version)?;
		Ok(Self(v))
	}
}

impl<V> Encode<V> for Version {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		self.0.encode(w, version)
	}
}

impl fmt::Debug for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:#x}", self.0)
	}
}

/// A list of versions in preferred order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Versions(Vec<Version>);

impl Versions {
	/// Return the first of our versions that the peer also supports.
	pub fn select(&self, peer: &Versions) -> Option<Version> {
		self.0.iter().find(|v| peer.contains(v)).copied()
	}
}

impl<V: Clone> Decode<V> for Versions {
	/// Decode the version list.
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let count = u64::decode(r, version.clone())?;
		if count > MAX_VERSIONS {
			return Err(DecodeError::TooMany);
		}

		let mut vs = Vec::new();

		for _ in 0..count {
			let v = Version::decode(r, version.clone())?;
			vs.push(v);
		}

		Ok(Self(vs))
	}
}

impl<V: Clone> Encode<V> for Versions {
	/// Encode the version list.
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		if self.0.len() as u64 > MAX_VERSIONS {
			return Err(EncodeError::TooMany);
		}

		self.0.len().encode(w, version.clone())?;

		for v in &self.0 {
			v.encode(w, version.clone())?;
		}

		Ok(())
	}
}

impl Deref for Versions {
	type Target = Vec<Version>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl From<Vec<Version>> for Versions {
	fn from(vs: Vec<Version>) -> Self {
		Self(vs)
	}
}

impl<const N: usize> From<[Version; N]> for Versions {
	fn from(vs: [Version; N]) -> Self {
		Self(vs.to_vec())
	}
}

impl fmt::Debug for Versions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.0.iter()).finish()
	}
}
