use std::io;

use bytes::{Buf, Bytes, BytesMut};

use crate::coding::*;

/// The outcome of an incremental decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
	/// A complete item and the number of bytes it occupied.
	Item(T, usize),

	/// The buffer holds a valid prefix; call again once more bytes arrive.
	NeedMoreBytes,
}

impl<T> Decoded<T> {
	pub fn into_item(self) -> Option<T> {
		match self {
			Self::Item(item, _) => Some(item),
			Self::NeedMoreBytes => None,
		}
	}
}

/// Attempt to decode a `T` from the front of `buf` without consuming anything.
///
/// [DecodeError::Truncated] is mapped to [Decoded::NeedMoreBytes]; any other error is returned.
pub fn try_decode<T: Decode<V>, V>(buf: &[u8], version: V) -> Result<Decoded<T>, DecodeError> {
	let mut cursor = io::Cursor::new(buf);
	match T::decode(&mut cursor, version) {
		Ok(item) => Ok(Decoded::Item(item, cursor.position() as usize)),
		Err(DecodeError::Truncated) => Ok(Decoded::NeedMoreBytes),
		Err(e) => Err(e),
	}
}

/// Buffers the bytes received on a stream until they can be decoded.
///
/// Bytes are only removed once a complete item has been decoded, so a partial read is never lost.
#[derive(Debug)]
pub struct Reader<V> {
	buffer: BytesMut,
	version: V,
}

impl<V: Clone> Reader<V> {
	pub fn new(version: V) -> Self {
		Self {
			buffer: Default::default(),
			version,
		}
	}

	/// Append a chunk received from the transport.
	pub fn push(&mut self, chunk: &[u8]) {
		self.buffer.extend_from_slice(chunk);
	}

	/// Decode the next item, consuming its bytes, or `None` if more data is needed.
	pub fn decode<T: Decode<V>>(&mut self) -> Result<Option<T>, DecodeError> {
		match try_decode(&self.buffer[..], self.version.clone())? {
			Decoded::Item(item, size) => {
				self.buffer.advance(size);
				Ok(Some(item))
			}
			Decoded::NeedMoreBytes => Ok(None),
		}
	}

	/// Decode the next item without consuming it.
	pub fn decode_peek<T: Decode<V>>(&self) -> Result<Option<T>, DecodeError> {
		try_decode(&self.buffer[..], self.version.clone()).map(Decoded::into_item)
	}

	/// Run a stateful decoder against the buffered bytes, consuming whatever it reports.
	pub fn decode_with<T, F>(&mut self, f: F) -> Result<Option<T>, DecodeError>
	where
		F: FnOnce(&[u8]) -> Result<Decoded<T>, DecodeError>,
	{
		match f(&self.buffer[..])? {
			Decoded::Item(item, size) => {
				self.buffer.advance(size);
				Ok(Some(item))
			}
			Decoded::NeedMoreBytes => Ok(None),
		}
	}

	/// Split off exactly `size` bytes if they have all arrived.
	pub fn read_exact(&mut self, size: usize) -> Option<Bytes> {
		if self.buffer.len() < size {
			return None;
		}
		Some(self.buffer.split_to(size).freeze())
	}

	/// Error if there are any unconsumed bytes, used when the stream is finished.
	pub fn finish(&mut self) -> Result<(), DecodeError> {
		match self.buffer.is_empty() {
			true => Ok(()),
			false => Err(DecodeError::Malformed),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}

	pub fn len(&self) -> usize {
		self.buffer.len()
	}

	/// Drop any residue, used when the stream is reset.
	pub fn clear(&mut self) {
		self.buffer.clear();
	}

	/// Cast the reader to a different version, used during version negotiation.
	pub fn with_version<O>(self, version: O) -> Reader<O> {
		Reader {
			buffer: self.buffer,
			version,
		}
	}
}
