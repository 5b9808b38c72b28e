use std::fmt;

use bytes::Bytes;

use crate::coding::*;

// A tuple longer than this is a protocol violation.
const MAX_FIELDS: usize = 32;

/// An ordered tuple of byte strings identifying a group of tracks.
///
/// Displayed as the fields joined by `/`, which is also what [TrackNamespace::from_path] accepts.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackNamespace(Vec<Bytes>);

impl TrackNamespace {
	pub fn new(fields: Vec<Bytes>) -> Self {
		Self(fields)
	}

	/// Split a `/` separated path into fields, ignoring empty segments.
	pub fn from_path(path: &str) -> Self {
		Self(
			path.split('/')
				.filter(|s| !s.is_empty())
				.map(|s| Bytes::copy_from_slice(s.as_bytes()))
				.collect(),
		)
	}

	pub fn fields(&self) -> &[Bytes] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if `prefix` matches the leading fields of this namespace.
	pub fn has_prefix(&self, prefix: &TrackNamespace) -> bool {
		self.0.starts_with(&prefix.0)
	}
}

impl<S: AsRef<str>> From<&[S]> for TrackNamespace {
	fn from(fields: &[S]) -> Self {
		Self(
			fields
				.iter()
				.map(|s| Bytes::copy_from_slice(s.as_ref().as_bytes()))
				.collect(),
		)
	}
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for TrackNamespace {
	fn from(fields: [S; N]) -> Self {
		Self::from(&fields[..])
	}
}

impl fmt::Display for TrackNamespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, field) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str("/")?;
			}
			f.write_str(&String::from_utf8_lossy(field))?;
		}
		Ok(())
	}
}

impl fmt::Debug for TrackNamespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}", self.to_string())
	}
}

impl<V: Clone> Encode<V> for TrackNamespace {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		if self.0.len() > MAX_FIELDS {
			return Err(EncodeError::TooMany);
		}

		self.0.len().encode(w, version.clone())?;
		for field in &self.0 {
			field.encode(w, version.clone())?;
		}
		Ok(())
	}
}

impl<V: Clone> Decode<V> for TrackNamespace {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let count = usize::decode(r, version.clone())?;
		if count > MAX_FIELDS {
			return Err(DecodeError::TooMany);
		}

		let mut fields = Vec::with_capacity(count);
		for _ in 0..count {
			fields.push(Bytes::decode(r, version.clone())?);
		}

		Ok(Self(fields))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn path_round_trip() {
		let ns = TrackNamespace::from_path("conference/room123/");
		assert_eq!(ns.len(), 2);
		assert_eq!(ns.to_string(), "conference/room123");
		assert_eq!(ns, TrackNamespace::from(["conference", "room123"]));
	}

	#[test]
	fn prefix() {
		let ns = TrackNamespace::from(["live", "sports", "soccer"]);
		assert!(ns.has_prefix(&TrackNamespace::from(["live"])));
		assert!(ns.has_prefix(&TrackNamespace::default()));
		assert!(!ns.has_prefix(&TrackNamespace::from(["live", "news"])));
	}

	#[test]
	fn wire() {
		let ns = TrackNamespace::from(["a", "bc"]);
		let encoded = ns.encode_bytes(()).unwrap();
		assert_eq!(encoded.as_ref(), &[0x02, 0x01, b'a', 0x02, b'b', b'c']);

		let mut buf = encoded;
		assert_eq!(TrackNamespace::decode(&mut buf, ()).unwrap(), ns);
	}

	#[test]
	fn too_many_fields() {
		let mut buf = bytes::BytesMut::new();
		33u64.encode(&mut buf, ()).unwrap();
		let mut buf = buf.freeze();
		assert_eq!(TrackNamespace::decode(&mut buf, ()), Err(DecodeError::TooMany));
	}
}
