//! Fetch streams: a header with the request id followed by objects from arbitrary locations.

use std::io;

use bytes::Buf;

use crate::{
	coding::*,
	data::{ExtensionPolicy, Extensions, Object, decode_payload, encode_payload},
	ietf::RequestId,
};

/// The header at the start of a fetch stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchHeader {
	pub request_id: RequestId,
}

impl FetchHeader {
	pub const STREAM_TYPE: u64 = 0x05;
}

impl<V> Encode<V> for FetchHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, _: V) -> Result<(), EncodeError> {
		Self::STREAM_TYPE.encode(w, ())?;
		self.request_id.encode(w, ())
	}
}

impl<V> Decode<V> for FetchHeader {
	fn decode<R: Buf>(r: &mut R, _: V) -> Result<Self, DecodeError> {
		let kind = u64::decode(r, ())?;
		if kind != Self::STREAM_TYPE {
			return Err(DecodeError::InvalidValue);
		}

		let request_id = RequestId::decode(r, ())?;
		Ok(Self { request_id })
	}
}

/// The serialization flags in front of each fetch object.
struct FetchFlags;

impl FetchFlags {
	const SUBGROUP_MASK: u8 = 0x03;
	const SUBGROUP_ZERO: u8 = 0x00;
	const SUBGROUP_PRIOR: u8 = 0x01;
	const SUBGROUP_NEXT: u8 = 0x02;
	const SUBGROUP_PRESENT: u8 = 0x03;
	const OBJECT_PRESENT: u8 = 0x04;
	const GROUP_PRESENT: u8 = 0x08;
	const PRIORITY_PRESENT: u8 = 0x10;
	const EXTENSIONS_PRESENT: u8 = 0x20;
	const ALL: u8 = 0x3f;
}

// The fields a later object may inherit from the one before it.
#[derive(Clone, Copy, Debug)]
struct Prior {
	group_id: u64,
	subgroup_id: u64,
	object_id: u64,
	priority: u8,
}

/// Incrementally decodes the objects on a fetch stream.
#[derive(Debug)]
pub struct FetchReader {
	// False when the stream type was already consumed by the caller.
	expect_type: bool,
	header: Option<FetchHeader>,
	prior: Option<Prior>,
	policy: ExtensionPolicy,
}

impl FetchReader {
	/// Expect the stream type at the start of the buffer.
	pub fn new(policy: ExtensionPolicy) -> Self {
		Self {
			expect_type: true,
			header: None,
			prior: None,
			policy,
		}
	}

	/// The stream type has already been read, ex. by the dispatcher.
	pub fn with_type(policy: ExtensionPolicy) -> Self {
		Self {
			expect_type: false,
			..Self::new(policy)
		}
	}

	pub fn request_id(&self) -> Option<RequestId> {
		self.header.map(|h| h.request_id)
	}

	/// Decode the header on its own, so the fetch is known before the first object arrives.
	pub fn try_decode_header(&mut self, buf: &[u8]) -> Result<Decoded<FetchHeader>, DecodeError> {
		if let Some(header) = self.header {
			return Ok(Decoded::Item(header, 0));
		}

		let mut cursor = io::Cursor::new(buf);
		match self.decode_header(&mut cursor) {
			Ok(header) => {
				self.header = Some(header);
				Ok(Decoded::Item(header, cursor.position() as usize))
			}
			Err(DecodeError::Truncated) => Ok(Decoded::NeedMoreBytes),
			Err(err) => Err(err),
		}
	}

	/// Decode the next object from the front of `buf`, including the header if not yet seen.
	///
	/// Fetch objects carry no track alias; it's left as zero and the request id identifies the track.
	pub fn try_decode_next(&mut self, buf: &[u8]) -> Result<Decoded<Object>, DecodeError> {
		let mut cursor = io::Cursor::new(buf);

		let header = match self.header {
			Some(header) => header,
			None => match self.decode_header(&mut cursor) {
				Ok(header) => header,
				Err(DecodeError::Truncated) => return Ok(Decoded::NeedMoreBytes),
				Err(err) => return Err(err),
			},
		};

		let (object, prior) = match self.decode_object(&mut cursor) {
			Ok(res) => res,
			Err(DecodeError::Truncated) => return Ok(Decoded::NeedMoreBytes),
			Err(err) => return Err(err),
		};

		self.header = Some(header);
		self.prior = Some(prior);

		Ok(Decoded::Item(object, cursor.position() as usize))
	}

	fn decode_header<R: Buf>(&self, r: &mut R) -> Result<FetchHeader, DecodeError> {
		match self.expect_type {
			true => FetchHeader::decode(r, ()),
			false => Ok(FetchHeader {
				request_id: RequestId::decode(r, ())?,
			}),
		}
	}

	fn decode_object<R: Buf>(&self, r: &mut R) -> Result<(Object, Prior), DecodeError> {
		let flags = u8::decode(r, ())?;
		if flags & !FetchFlags::ALL != 0 {
			return Err(DecodeError::Malformed);
		}

		// The first object has nothing to inherit from.
		let prior = || self.prior.ok_or(DecodeError::Malformed);

		let group_id = match flags & FetchFlags::GROUP_PRESENT != 0 {
			true => u64::decode(r, ())?,
			false => prior()?.group_id,
		};

		let subgroup_id = match flags & FetchFlags::SUBGROUP_MASK {
			FetchFlags::SUBGROUP_ZERO => 0,
			FetchFlags::SUBGROUP_PRIOR => prior()?.subgroup_id,
			FetchFlags::SUBGROUP_NEXT => prior()?.subgroup_id.checked_add(1).ok_or(DecodeError::BoundsExceeded)?,
			_ => u64::decode(r, ())?,
		};

		let object_id = match flags & FetchFlags::OBJECT_PRESENT != 0 {
			true => u64::decode(r, ())?,
			false => prior()?.object_id.checked_add(1).ok_or(DecodeError::BoundsExceeded)?,
		};

		let priority = match flags & FetchFlags::PRIORITY_PRESENT != 0 {
			true => u8::decode(r, ())?,
			false => prior()?.priority,
		};

		let extensions = match flags & FetchFlags::EXTENSIONS_PRESENT != 0 {
			true => Extensions::decode_with(r, self.policy)?,
			false => Extensions::default(),
		};

		let (payload, status) = decode_payload(r)?;

		let object = Object {
			track_alias: 0,
			group_id,
			subgroup_id,
			object_id,
			publisher_priority: Some(priority),
			extensions,
			payload,
			status,
		};

		let prior = Prior {
			group_id,
			subgroup_id,
			object_id,
			priority,
		};

		Ok((object, prior))
	}
}

/// Encodes a fetch stream, choosing the most compact flags for each object.
#[derive(Debug)]
pub struct FetchWriter {
	header: FetchHeader,
	prior: Option<Prior>,
}

impl FetchWriter {
	pub fn new(request_id: RequestId) -> Self {
		Self {
			header: FetchHeader { request_id },
			prior: None,
		}
	}

	pub fn encode_header<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.header.encode(w, ())
	}

	/// Encode the next object.
	///
	/// A missing priority inherits the previous object's, so the first object must have one.
	pub fn encode_object<W: bytes::BufMut>(&mut self, w: &mut W, object: &Object) -> Result<(), EncodeError> {
		let priority = object
			.publisher_priority
			.or(self.prior.map(|p| p.priority))
			.ok_or(EncodeError::InvalidValue)?;

		let mut flags = 0;

		let same_group = matches!(self.prior, Some(p) if p.group_id == object.group_id);
		if !same_group {
			flags |= FetchFlags::GROUP_PRESENT;
		}

		flags |= match self.prior {
			_ if object.subgroup_id == 0 => FetchFlags::SUBGROUP_ZERO,
			Some(p) if p.subgroup_id == object.subgroup_id => FetchFlags::SUBGROUP_PRIOR,
			Some(p) if p.subgroup_id.checked_add(1) == Some(object.subgroup_id) => FetchFlags::SUBGROUP_NEXT,
			_ => FetchFlags::SUBGROUP_PRESENT,
		};

		let next_object = matches!(self.prior, Some(p) if p.object_id.checked_add(1) == Some(object.object_id));
		if !next_object {
			flags |= FetchFlags::OBJECT_PRESENT;
		}

		let same_priority = matches!(self.prior, Some(p) if p.priority == priority);
		if !same_priority {
			flags |= FetchFlags::PRIORITY_PRESENT;
		}

		if !object.extensions.is_empty() {
			flags |= FetchFlags::EXTENSIONS_PRESENT;
		}

		let mut buf: Vec<u8> = Vec::new();
		flags.encode(&mut buf, ())?;
		if flags & FetchFlags::GROUP_PRESENT != 0 {
			object.group_id.encode(&mut buf, ())?;
		}
		if flags & FetchFlags::SUBGROUP_MASK == FetchFlags::SUBGROUP_PRESENT {
			object.subgroup_id.encode(&mut buf, ())?;
		}
		if flags & FetchFlags::OBJECT_PRESENT != 0 {
			object.object_id.encode(&mut buf, ())?;
		}
		if flags & FetchFlags::PRIORITY_PRESENT != 0 {
			priority.encode(&mut buf, ())?;
		}
		if flags & FetchFlags::EXTENSIONS_PRESENT != 0 {
			object.extensions.encode(&mut buf, ())?;
		}
		encode_payload(&mut buf, object)?;

		w.put_slice(&buf);
		self.prior = Some(Prior {
			group_id: object.group_id,
			subgroup_id: object.subgroup_id,
			object_id: object.object_id,
			priority,
		});

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::data::{ExtensionValue, ObjectStatus};
	use bytes::Bytes;

	fn object(group: u64, subgroup: u64, id: u64, payload: &'static [u8]) -> Object {
		Object {
			track_alias: 0,
			group_id: group,
			subgroup_id: subgroup,
			object_id: id,
			publisher_priority: Some(7),
			extensions: Extensions::default(),
			payload: Bytes::from_static(payload),
			status: ObjectStatus::Normal,
		}
	}

	fn decode_all(buf: &[u8]) -> Result<Vec<Object>, DecodeError> {
		let mut reader = FetchReader::new(ExtensionPolicy::Preserve);
		let mut objects = Vec::new();
		let mut rest = buf;
		while let Decoded::Item(object, size) = reader.try_decode_next(rest)? {
			objects.push(object);
			rest = &rest[size..];
		}
		assert!(rest.is_empty(), "residue");
		Ok(objects)
	}

	#[test]
	fn compact_flags() {
		let objects = vec![
			object(1, 0, 0, b"a"),
			object(1, 0, 1, b"b"),
			object(1, 1, 2, b"c"),
			object(2, 5, 0, b"d"),
		];

		let mut writer = FetchWriter::new(RequestId(4));
		let mut buf: Vec<u8> = Vec::new();
		writer.encode_header(&mut buf).unwrap();
		for object in &objects {
			writer.encode_object(&mut buf, object).unwrap();
		}

		#[rustfmt::skip]
		let expected = vec![
			0x05, 0x04, // header
			0x1c, 0x01, 0x00, 0x07, 0x01, b'a', // group, object, priority
			0x00, 0x01, b'b', // everything inherited
			0x02, 0x01, b'c', // subgroup is prior + 1
			0x0f, 0x02, 0x05, 0x00, 0x01, b'd', // new group, explicit subgroup, object reset
		];
		assert_eq!(buf, expected);

		assert_eq!(decode_all(&buf).unwrap(), objects);
	}

	#[test]
	fn first_object_references_prior() {
		// Header, then flags without a group id.
		let buf = [0x05, 0x00, 0x14, 0x00, 0x07, 0x01, b'a'];
		assert_eq!(decode_all(&buf), Err(DecodeError::Malformed));

		// Subgroup "prior" on the first object.
		let buf = [0x05, 0x00, 0x1d, 0x00, 0x00, 0x07, 0x01, b'a'];
		assert_eq!(decode_all(&buf), Err(DecodeError::Malformed));
	}

	#[test]
	fn unknown_flags() {
		let buf = [0x05, 0x00, 0x5c, 0x00, 0x00, 0x07, 0x01, b'a'];
		assert_eq!(decode_all(&buf), Err(DecodeError::Malformed));
	}

	#[test]
	fn first_object_needs_priority() {
		let mut obj = object(0, 0, 0, b"a");
		obj.publisher_priority = None;

		let mut writer = FetchWriter::new(RequestId(0));
		assert_eq!(
			writer.encode_object(&mut Vec::<u8>::new(), &obj),
			Err(EncodeError::InvalidValue)
		);
	}

	#[test]
	fn split_at_every_offset() {
		let mut first = object(3, 0, 9, b"payload");
		first
			.extensions
			.push(6, ExtensionValue::VarInt(0x85))
			.unwrap();

		let mut writer = FetchWriter::new(RequestId(2));
		let mut buf: Vec<u8> = Vec::new();
		writer.encode_header(&mut buf).unwrap();
		writer.encode_object(&mut buf, &first).unwrap();

		for split in 0..buf.len() {
			let mut reader = FetchReader::new(ExtensionPolicy::Preserve);
			assert_eq!(reader.try_decode_next(&buf[..split]), Ok(Decoded::NeedMoreBytes));
			assert_eq!(reader.request_id(), None);

			assert_eq!(reader.try_decode_next(&buf), Ok(Decoded::Item(first.clone(), buf.len())));
			assert_eq!(reader.request_id(), Some(RequestId(2)));
		}
	}

	#[test]
	fn header_after_type() {
		let mut reader = FetchReader::with_type(ExtensionPolicy::Preserve);
		assert_eq!(
			reader.try_decode_header(&[0x40, 0x40]).unwrap(),
			Decoded::Item(
				FetchHeader {
					request_id: RequestId(64)
				},
				2
			)
		);
	}

	#[test]
	fn wrong_stream_type() {
		let mut buf = Bytes::from_static(&[0x04, 0x00]);
		assert_eq!(FetchHeader::decode(&mut buf, ()), Err(DecodeError::InvalidValue));
	}
}
