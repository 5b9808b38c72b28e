//! Object datagrams: a single object with no stream framing.

use bytes::{Buf, Bytes};

use crate::{
	coding::*,
	data::{ExtensionPolicy, Extensions, Object, ObjectStatus},
};

/// The flags packed into the datagram type.
struct DatagramType;

impl DatagramType {
	const EXTENSIONS: u64 = 0x01;
	const END_OF_GROUP: u64 = 0x02;
	const NO_OBJECT_ID: u64 = 0x04;
	const NO_PRIORITY: u64 = 0x08;
	const STATUS: u64 = 0x20;

	fn is_valid(kind: u64) -> bool {
		match kind & Self::STATUS {
			0 => kind <= 0x0f,
			// Status datagrams never mark the end of the group; the status does that.
			_ => kind <= 0x2f && kind & (0x10 | Self::END_OF_GROUP) == 0,
		}
	}
}

/// An object received or sent as a datagram.
///
/// Datagrams may arrive in any order, so each one decodes on its own.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Datagram {
	/// The subgroup id is always zero.
	pub object: Object,

	/// This is the last object in the group.
	pub end_of_group: bool,
}

impl Datagram {
	pub fn new(object: Object) -> Self {
		Self {
			object,
			end_of_group: false,
		}
	}

	/// The most compact type that can carry this object.
	pub fn datagram_type(&self) -> Result<u64, EncodeError> {
		let object = &self.object;

		let mut kind = match object.status {
			ObjectStatus::Normal => 0,
			_ if !object.payload.is_empty() => return Err(EncodeError::InvalidValue),
			_ if self.end_of_group => return Err(EncodeError::InvalidValue),
			_ => DatagramType::STATUS,
		};

		if !object.extensions.is_empty() {
			kind |= DatagramType::EXTENSIONS;
		}
		if self.end_of_group {
			kind |= DatagramType::END_OF_GROUP;
		}
		if object.object_id == 0 {
			kind |= DatagramType::NO_OBJECT_ID;
		}
		if object.publisher_priority.is_none() {
			kind |= DatagramType::NO_PRIORITY;
		}

		Ok(kind)
	}

	/// Encode the whole datagram; the payload runs to the end with no length prefix.
	pub fn encode<W: bytes::BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		let kind = self.datagram_type()?;
		let object = &self.object;

		kind.encode(w, ())?;
		object.track_alias.encode(w, ())?;
		object.group_id.encode(w, ())?;
		if kind & DatagramType::NO_OBJECT_ID == 0 {
			object.object_id.encode(w, ())?;
		}
		if let Some(priority) = object.publisher_priority {
			priority.encode(w, ())?;
		}
		if kind & DatagramType::EXTENSIONS != 0 {
			object.extensions.encode(w, ())?;
		}

		match kind & DatagramType::STATUS {
			0 => w.put_slice(&object.payload),
			_ => object.status.encode(w, ())?,
		}

		Ok(())
	}

	pub fn encode_bytes(&self) -> Result<Bytes, EncodeError> {
		let mut buf = bytes::BytesMut::new();
		self.encode(&mut buf)?;
		Ok(buf.freeze())
	}

	/// Decode a complete datagram.
	///
	/// The transport delivers datagrams whole, so running out of bytes is [DecodeError::Malformed].
	pub fn decode(mut buf: Bytes, policy: ExtensionPolicy) -> Result<Self, DecodeError> {
		match Self::decode_inner(&mut buf, policy) {
			Err(DecodeError::Truncated) => Err(DecodeError::Malformed),
			res => res,
		}
	}

	fn decode_inner(buf: &mut Bytes, policy: ExtensionPolicy) -> Result<Self, DecodeError> {
		let kind = u64::decode(buf, ())?;
		if !DatagramType::is_valid(kind) {
			return Err(DecodeError::InvalidValue);
		}

		let track_alias = u64::decode(buf, ())?;
		let group_id = u64::decode(buf, ())?;

		let object_id = match kind & DatagramType::NO_OBJECT_ID {
			0 => u64::decode(buf, ())?,
			_ => 0,
		};

		let publisher_priority = match kind & DatagramType::NO_PRIORITY {
			0 => Some(u8::decode(buf, ())?),
			_ => None,
		};

		let extensions = match kind & DatagramType::EXTENSIONS {
			0 => Extensions::default(),
			_ => Extensions::decode_with(buf, policy)?,
		};

		let (payload, status) = match kind & DatagramType::STATUS {
			0 => (buf.split_off(0), ObjectStatus::Normal),
			_ => {
				let status = ObjectStatus::decode(buf, ())?;
				if buf.has_remaining() {
					return Err(DecodeError::Malformed);
				}
				(Bytes::new(), status)
			}
		};

		let object = Object {
			track_alias,
			group_id,
			subgroup_id: 0,
			object_id,
			publisher_priority,
			extensions,
			payload,
			status,
		};

		Ok(Self {
			object,
			end_of_group: kind & DatagramType::END_OF_GROUP != 0,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::data::ExtensionValue;

	fn object(object_id: u64, payload: &'static [u8]) -> Object {
		Object {
			track_alias: 3,
			group_id: 9,
			object_id,
			publisher_priority: Some(0x40),
			payload: Bytes::from_static(payload),
			..Default::default()
		}
	}

	#[test]
	fn out_of_order() {
		let five = Datagram::new(object(5, b"five")).encode_bytes().unwrap();
		let three = Datagram::new(object(3, b"three")).encode_bytes().unwrap();

		let decoded = Datagram::decode(five, ExtensionPolicy::Preserve).unwrap();
		assert_eq!(decoded.object, object(5, b"five"));

		let decoded = Datagram::decode(three, ExtensionPolicy::Preserve).unwrap();
		assert_eq!(decoded.object, object(3, b"three"));
	}

	#[test]
	fn wire() {
		let datagram = Datagram::new(object(5, b"hi"));

		#[rustfmt::skip]
		let expected = [
			0x00, // type
			0x03, // alias
			0x09, // group
			0x05, // object
			0x40, // priority
			b'h', b'i',
		];
		assert_eq!(datagram.encode_bytes().unwrap().as_ref(), &expected);
	}

	#[test]
	fn compact_types() {
		let mut datagram = Datagram::new(object(0, b"x"));
		datagram.end_of_group = true;
		datagram.object.publisher_priority = None;
		datagram.object.extensions.push(2, ExtensionValue::VarInt(1)).unwrap();
		assert_eq!(datagram.datagram_type().unwrap(), 0x0f);

		let encoded = datagram.encode_bytes().unwrap();
		assert_eq!(encoded.as_ref(), &[0x0f, 0x03, 0x09, 0x02, 0x02, 0x01, b'x']);

		let decoded = Datagram::decode(encoded, ExtensionPolicy::Preserve).unwrap();
		assert_eq!(decoded, datagram);
	}

	#[test]
	fn status() {
		let mut object = object(7, b"");
		object.status = ObjectStatus::EndOfTrack;
		let datagram = Datagram::new(object);
		assert_eq!(datagram.datagram_type().unwrap(), 0x20);

		let encoded = datagram.encode_bytes().unwrap();
		assert_eq!(encoded.as_ref(), &[0x20, 0x03, 0x09, 0x07, 0x40, 0x04]);
		assert_eq!(Datagram::decode(encoded, ExtensionPolicy::Preserve).unwrap(), datagram);

		// Anything after the status is malformed.
		let trailing = Bytes::from_static(&[0x20, 0x03, 0x09, 0x07, 0x40, 0x04, 0x00]);
		assert_eq!(
			Datagram::decode(trailing, ExtensionPolicy::Preserve),
			Err(DecodeError::Malformed)
		);
	}

	#[test]
	fn invalid_status_combinations() {
		let mut datagram = Datagram::new(object(1, b"body"));
		datagram.object.status = ObjectStatus::DoesNotExist;
		assert_eq!(datagram.encode_bytes(), Err(EncodeError::InvalidValue));

		let mut datagram = Datagram::new(object(1, b""));
		datagram.object.status = ObjectStatus::EndOfGroup;
		datagram.end_of_group = true;
		assert_eq!(datagram.encode_bytes(), Err(EncodeError::InvalidValue));
	}

	#[test]
	fn type_table() {
		for kind in 0..0x40u64 {
			let valid = kind <= 0x0f || matches!(kind, 0x20 | 0x21 | 0x24 | 0x25 | 0x28 | 0x29 | 0x2c | 0x2d);
			assert_eq!(DatagramType::is_valid(kind), valid, "type {kind:#x}");
		}

		let buf = Bytes::from_static(&[0x22, 0x03, 0x09, 0x00]);
		assert_eq!(
			Datagram::decode(buf, ExtensionPolicy::Preserve),
			Err(DecodeError::InvalidValue)
		);
	}

	#[test]
	fn truncated() {
		let encoded = Datagram::new(object(5, b"")).encode_bytes().unwrap();

		// An empty payload is still a complete datagram.
		assert!(Datagram::decode(encoded.clone(), ExtensionPolicy::Preserve).is_ok());

		for len in 0..encoded.len() {
			assert_eq!(
				Datagram::decode(encoded.slice(..len), ExtensionPolicy::Preserve),
				Err(DecodeError::Malformed)
			);
		}
	}
}
