//! Subgroup streams: a header followed by objects with increasing ids.

use std::io;

use bytes::Buf;

use crate::{
	coding::*,
	data::{ExtensionPolicy, Extensions, Object, decode_payload, encode_payload},
};

/// How the subgroup id is conveyed by the header type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubgroupId {
	/// The subgroup id is zero.
	Zero,

	/// The subgroup id is the id of the first object on the stream.
	FirstObject,

	/// The subgroup id is written in the header.
	Explicit(u64),
}

/// The header at the start of every subgroup stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubgroupHeader {
	pub track_alias: u64,
	pub group_id: u64,
	pub subgroup_id: SubgroupId,

	/// None when the header type omits the priority byte.
	pub publisher_priority: Option<u8>,

	/// Every object carries an extension block.
	pub has_extensions: bool,

	/// The stream contains the last object in the group.
	pub has_end: bool,
}

impl SubgroupHeader {
	const PRIORITY_START: u64 = 0x10;
	const NO_PRIORITY_START: u64 = 0x30;

	/// Returns true if the stream type is one of the 24 subgroup header types.
	pub fn is_type(kind: u64) -> bool {
		matches!(kind, 0x10..=0x15 | 0x18..=0x1d | 0x30..=0x35 | 0x38..=0x3d)
	}

	/// The header type that describes this header's flags.
	pub fn stream_type(&self) -> u64 {
		let mut kind = Self::PRIORITY_START;
		if self.has_extensions {
			kind |= 0x01;
		}
		kind |= match self.subgroup_id {
			SubgroupId::Zero => 0x00,
			SubgroupId::FirstObject => 0x02,
			SubgroupId::Explicit(_) => 0x04,
		};
		if self.has_end {
			kind |= 0x08;
		}
		if self.publisher_priority.is_none() {
			kind |= 0x20;
		}
		kind
	}

	/// Decode the rest of the header once the stream type has been read.
	pub fn decode_body<R: Buf>(kind: u64, r: &mut R) -> Result<Self, DecodeError> {
		if !Self::is_type(kind) {
			return Err(DecodeError::InvalidValue);
		}

		let track_alias = u64::decode(r, ())?;
		let group_id = u64::decode(r, ())?;

		let subgroup_id = match kind & 0x07 {
			0x00 | 0x01 => SubgroupId::Zero,
			0x02 | 0x03 => SubgroupId::FirstObject,
			_ => SubgroupId::Explicit(u64::decode(r, ())?),
		};

		let publisher_priority = match kind < Self::NO_PRIORITY_START {
			true => Some(u8::decode(r, ())?),
			false => None,
		};

		Ok(Self {
			track_alias,
			group_id,
			subgroup_id,
			publisher_priority,
			has_extensions: kind & 0x01 != 0,
			has_end: kind & 0x08 != 0,
		})
	}
}

impl<V> Encode<V> for SubgroupHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, _: V) -> Result<(), EncodeError> {
		self.stream_type().encode(w, ())?;
		self.track_alias.encode(w, ())?;
		self.group_id.encode(w, ())?;
		if let SubgroupId::Explicit(id) = self.subgroup_id {
			id.encode(w, ())?;
		}
		if let Some(priority) = self.publisher_priority {
			priority.encode(w, ())?;
		}
		Ok(())
	}
}

impl<V> Decode<V> for SubgroupHeader {
	fn decode<R: Buf>(r: &mut R, _: V) -> Result<Self, DecodeError> {
		let kind = u64::decode(r, ())?;
		Self::decode_body(kind, r)
	}
}

/// Incrementally decodes the objects on a subgroup stream.
#[derive(Debug)]
pub struct SubgroupReader {
	// Set when the stream type was already consumed by the caller.
	kind: Option<u64>,
	header: Option<SubgroupHeader>,
	first_object: Option<u64>,
	prev_object: Option<u64>,
	policy: ExtensionPolicy,
}

impl SubgroupReader {
	/// Expect the stream type at the start of the buffer.
	pub fn new(policy: ExtensionPolicy) -> Self {
		Self {
			kind: None,
			header: None,
			first_object: None,
			prev_object: None,
			policy,
		}
	}

	/// The stream type has already been read, ex. by the dispatcher.
	pub fn with_type(kind: u64, policy: ExtensionPolicy) -> Self {
		Self {
			kind: Some(kind),
			..Self::new(policy)
		}
	}

	pub fn header(&self) -> Option<&SubgroupHeader> {
		self.header.as_ref()
	}

	/// The id of the last object decoded.
	pub fn last_object(&self) -> Option<u64> {
		self.prev_object
	}

	/// Decode the header on its own, so it's known before the first object arrives.
	///
	/// Returns the cached header, consuming nothing, if it was already decoded.
	pub fn try_decode_header(&mut self, buf: &[u8]) -> Result<Decoded<SubgroupHeader>, DecodeError> {
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

	/// Decode the next object from the front of `buf`.
	///
	/// If the header has not been decoded yet, it is decoded together with the first object and
	/// included in the consumed count. Nothing changes when more bytes are needed.
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

		let object = match self.decode_object(&header, &mut cursor) {
			Ok(object) => object,
			Err(DecodeError::Truncated) => return Ok(Decoded::NeedMoreBytes),
			Err(err) => return Err(err),
		};

		self.header = Some(header);
		self.first_object.get_or_insert(object.object_id);
		self.prev_object = Some(object.object_id);

		Ok(Decoded::Item(object, cursor.position() as usize))
	}

	fn decode_header<R: Buf>(&self, r: &mut R) -> Result<SubgroupHeader, DecodeError> {
		match self.kind {
			Some(kind) => SubgroupHeader::decode_body(kind, r),
			None => SubgroupHeader::decode(r, ()),
		}
	}

	fn decode_object<R: Buf>(&self, header: &SubgroupHeader, r: &mut R) -> Result<Object, DecodeError> {
		let delta = u64::decode(r, ())?;

		let object_id = match self.prev_object {
			None => delta,
			Some(prev) => prev
				.checked_add(delta)
				.and_then(|id| id.checked_add(1))
				.filter(|id| *id <= VarInt::MAX.into_inner())
				.ok_or(DecodeError::BoundsExceeded)?,
		};

		let extensions = match header.has_extensions {
			true => Extensions::decode_with(r, self.policy)?,
			false => Extensions::default(),
		};

		let (payload, status) = decode_payload(r)?;

		let subgroup_id = match header.subgroup_id {
			SubgroupId::Zero => 0,
			SubgroupId::Explicit(id) => id,
			SubgroupId::FirstObject => self.first_object.unwrap_or(object_id),
		};

		Ok(Object {
			track_alias: header.track_alias,
			group_id: header.group_id,
			subgroup_id,
			object_id,
			publisher_priority: header.publisher_priority,
			extensions,
			payload,
			status,
		})
	}
}

/// Encodes a subgroup stream, computing the object id deltas.
#[derive(Debug)]
pub struct SubgroupWriter {
	header: SubgroupHeader,
	prev_object: Option<u64>,
}

impl SubgroupWriter {
	pub fn new(header: SubgroupHeader) -> Self {
		Self {
			header,
			prev_object: None,
		}
	}

	pub fn header(&self) -> &SubgroupHeader {
		&self.header
	}

	pub fn encode_header<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.header.encode(w, ())
	}

	/// Encode the next object, which must belong to this subgroup and have a larger id.
	///
	/// The object's subgroup id and priority are implied by the header and not checked.
	pub fn encode_object<W: bytes::BufMut>(&mut self, w: &mut W, object: &Object) -> Result<(), EncodeError> {
		if object.track_alias != self.header.track_alias || object.group_id != self.header.group_id {
			return Err(EncodeError::InvalidValue);
		}

		let delta = match self.prev_object {
			None => object.object_id,
			Some(prev) if object.object_id > prev => object.object_id - prev - 1,
			Some(_) => return Err(EncodeError::InvalidValue),
		};

		if !self.header.has_extensions && !object.extensions.is_empty() {
			return Err(EncodeError::InvalidValue);
		}

		// Encode into a scratch buffer so a failure leaves the stream untouched.
		let mut buf: Vec<u8> = Vec::new();
		delta.encode(&mut buf, ())?;
		if self.header.has_extensions {
			object.extensions.encode(&mut buf, ())?;
		}
		encode_payload(&mut buf, object)?;

		w.put_slice(&buf);
		self.prev_object = Some(object.object_id);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::data::{ExtensionValue, ObjectStatus};
	use bytes::Bytes;

	fn header() -> SubgroupHeader {
		SubgroupHeader {
			track_alias: 2,
			group_id: 9,
			subgroup_id: SubgroupId::Explicit(1),
			publisher_priority: Some(128),
			has_extensions: true,
			has_end: false,
		}
	}

	fn object(id: u64, payload: &'static [u8]) -> Object {
		Object {
			track_alias: 2,
			group_id: 9,
			subgroup_id: 1,
			object_id: id,
			publisher_priority: Some(128),
			extensions: Extensions::default(),
			payload: Bytes::from_static(payload),
			status: ObjectStatus::Normal,
		}
	}

	#[test]
	fn header_types() {
		let mut valid = Vec::new();
		for kind in 0..0x40 {
			if SubgroupHeader::is_type(kind) {
				valid.push(kind);
			}
		}

		#[rustfmt::skip]
		let expected: Vec<u64> = vec![
			0x10, 0x11, 0x12, 0x13, 0x14, 0x15,
			0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d,
			0x30, 0x31, 0x32, 0x33, 0x34, 0x35,
			0x38, 0x39, 0x3a, 0x3b, 0x3c, 0x3d,
		];
		assert_eq!(valid, expected);

		// Every type survives a decode and re-encode of its flags.
		for kind in expected {
			let mut body = Bytes::from_static(&[0x01, 0x02, 0x03, 0x04]);
			let header = SubgroupHeader::decode_body(kind, &mut body).unwrap();
			assert_eq!(header.stream_type(), kind, "type {kind:#x}");
		}
	}

	#[test]
	fn header_wire() {
		let encoded = header().encode_bytes(()).unwrap();
		assert_eq!(encoded.as_ref(), &[0x15, 0x02, 0x09, 0x01, 0x80]);

		let no_priority = SubgroupHeader {
			subgroup_id: SubgroupId::Zero,
			publisher_priority: None,
			has_extensions: false,
			has_end: true,
			..header()
		};
		assert_eq!(no_priority.encode_bytes(()).unwrap().as_ref(), &[0x38, 0x02, 0x09]);
	}

	#[test]
	fn object_id_deltas() {
		let mut writer = SubgroupWriter::new(header());
		let mut buf: Vec<u8> = Vec::new();
		writer.encode_header(&mut buf).unwrap();

		let header_len = buf.len();
		writer.encode_object(&mut buf, &object(5, b"a")).unwrap();
		writer.encode_object(&mut buf, &object(6, b"b")).unwrap();
		writer.encode_object(&mut buf, &object(9, b"c")).unwrap();

		// delta, extensions, length, payload
		#[rustfmt::skip]
		assert_eq!(&buf[header_len..], &[
			0x05, 0x00, 0x01, b'a',
			0x00, 0x00, 0x01, b'b',
			0x02, 0x00, 0x01, b'c',
		]);

		let mut reader = SubgroupReader::new(ExtensionPolicy::Preserve);
		let mut offset = 0;
		let mut ids = Vec::new();
		while offset < buf.len() {
			match reader.try_decode_next(&buf[offset..]).unwrap() {
				Decoded::Item(object, size) => {
					ids.push(object.object_id);
					offset += size;
				}
				Decoded::NeedMoreBytes => panic!("complete stream"),
			}
		}
		assert_eq!(ids, vec![5, 6, 9]);
		assert_eq!(reader.last_object(), Some(9));
	}

	#[test]
	fn non_increasing_rejected() {
		let mut writer = SubgroupWriter::new(header());
		let mut buf: Vec<u8> = Vec::new();
		writer.encode_object(&mut buf, &object(3, b"a")).unwrap();

		let before = buf.len();
		assert_eq!(writer.encode_object(&mut buf, &object(3, b"b")), Err(EncodeError::InvalidValue));
		assert_eq!(writer.encode_object(&mut buf, &object(1, b"b")), Err(EncodeError::InvalidValue));
		assert_eq!(buf.len(), before);
	}

	#[test]
	fn split_at_every_offset() {
		let mut obj = object(0, b"hello world");
		obj.extensions.push(2, ExtensionValue::VarInt(1_000_000)).unwrap();
		obj.extensions
			.push(13, ExtensionValue::Bytes(Bytes::from_static(b"cfg")))
			.unwrap();

		let mut writer = SubgroupWriter::new(header());
		let mut buf: Vec<u8> = Vec::new();
		writer.encode_header(&mut buf).unwrap();
		writer.encode_object(&mut buf, &obj).unwrap();

		for split in 0..buf.len() {
			let mut reader = SubgroupReader::new(ExtensionPolicy::Preserve);
			assert_eq!(reader.try_decode_next(&buf[..split]), Ok(Decoded::NeedMoreBytes), "split {split}");
			assert!(reader.header().is_none());

			assert_eq!(reader.try_decode_next(&buf), Ok(Decoded::Item(obj.clone(), buf.len())));
		}
	}

	#[test]
	fn header_then_objects() {
		let header = SubgroupHeader {
			subgroup_id: SubgroupId::FirstObject,
			publisher_priority: None,
			has_extensions: false,
			..header()
		};

		let mut writer = SubgroupWriter::new(header);
		let mut buf: Vec<u8> = Vec::new();
		writer.encode_header(&mut buf).unwrap();
		let header_len = buf.len();

		let mut first = object(4, b"x");
		first.extensions = Extensions::default();
		writer.encode_object(&mut buf, &first).unwrap();

		let mut second = object(5, b"");
		second.status = ObjectStatus::EndOfGroup;
		writer.encode_object(&mut buf, &second).unwrap();

		// The dispatcher reads the stream type before creating the reader.
		let mut reader = SubgroupReader::with_type(header.stream_type(), ExtensionPolicy::Preserve);
		let rest = &buf[1..];

		assert_eq!(
			reader.try_decode_header(rest).unwrap(),
			Decoded::Item(header, header_len - 1)
		);

		let mut rest = &rest[header_len - 1..];
		let mut objects = Vec::new();
		while let Decoded::Item(object, size) = reader.try_decode_next(rest).unwrap() {
			objects.push(object);
			rest = &rest[size..];
		}

		assert!(rest.is_empty());
		assert_eq!(objects.len(), 2);
		assert_eq!(objects[0].subgroup_id, 4);
		assert_eq!(objects[1].subgroup_id, 4);
		assert_eq!(objects[1].status, ObjectStatus::EndOfGroup);
		assert_eq!(objects[1].publisher_priority, None);
	}

	#[test]
	fn extensions_on_plain_header() {
		let header = SubgroupHeader {
			has_extensions: false,
			..header()
		};
		let mut obj = object(0, b"x");
		obj.extensions.push(4, ExtensionValue::VarInt(1)).unwrap();

		let mut writer = SubgroupWriter::new(header);
		assert_eq!(writer.encode_object(&mut Vec::<u8>::new(), &obj), Err(EncodeError::InvalidValue));
	}

	#[test]
	fn invalid_type() {
		let mut buf = Bytes::from_static(&[0x16, 0x00, 0x00]);
		assert_eq!(SubgroupHeader::decode(&mut buf, ()), Err(DecodeError::InvalidValue));
	}
}
