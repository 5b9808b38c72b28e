use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
	coding::*,
	data::{Extensions, LocHeaders},
	ietf::Location,
};

/// The status carried by a zero-length object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum ObjectStatus {
	#[default]
	Normal = 0x0,
	DoesNotExist = 0x1,
	EndOfGroup = 0x3,
	EndOfTrack = 0x4,
}

impl<V> Encode<V> for ObjectStatus {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		u64::from(*self).encode(w, version)
	}
}

impl<V> Decode<V> for ObjectStatus {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r, version)?).map_err(|_| DecodeError::InvalidValue)
	}
}

/// A decoded object, owned by the application once returned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Object {
	pub track_alias: u64,
	pub group_id: u64,
	pub subgroup_id: u64,
	pub object_id: u64,

	/// None when the stream or datagram omits it, meaning the subscription's priority applies.
	pub publisher_priority: Option<u8>,
	pub extensions: Extensions,
	pub payload: Bytes,
	pub status: ObjectStatus,
}

impl Object {
	pub fn location(&self) -> Location {
		Location::new(self.group_id, self.object_id)
	}

	/// Parse the LOC view of the extensions.
	pub fn loc(&self) -> Result<LocHeaders, DecodeError> {
		LocHeaders::from_extensions(&self.extensions)
	}
}

// Objects on subgroup and fetch streams end with a length, then the payload or a status.
pub(crate) fn encode_payload<W: bytes::BufMut>(w: &mut W, object: &Object) -> Result<(), EncodeError> {
	match object.status {
		ObjectStatus::Normal if !object.payload.is_empty() => {
			object.payload.len().encode(w, ())?;
			w.put_slice(&object.payload);
		}
		status => {
			if !object.payload.is_empty() {
				return Err(EncodeError::InvalidValue);
			}
			0u64.encode(w, ())?;
			status.encode(w, ())?;
		}
	}

	Ok(())
}

pub(crate) fn decode_payload<R: bytes::Buf>(r: &mut R) -> Result<(Bytes, ObjectStatus), DecodeError> {
	let size = usize::decode(r, ())?;
	if size == 0 {
		let status = ObjectStatus::decode(r, ())?;
		return Ok((Bytes::new(), status));
	}

	let payload = decode_exact(r, size)?;
	Ok((payload, ObjectStatus::Normal))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::data::ExtensionValue;

	#[test]
	fn status_payload() {
		let mut buf: Vec<u8> = Vec::new();
		let object = Object {
			status: ObjectStatus::EndOfGroup,
			..Default::default()
		};
		encode_payload(&mut buf, &object).unwrap();
		assert_eq!(buf, vec![0x00, 0x03]);

		let mut bytes = Bytes::from(buf);
		assert_eq!(decode_payload(&mut bytes).unwrap(), (Bytes::new(), ObjectStatus::EndOfGroup));
	}

	#[test]
	fn empty_normal_object() {
		let mut buf: Vec<u8> = Vec::new();
		encode_payload(&mut buf, &Object::default()).unwrap();
		assert_eq!(buf, vec![0x00, 0x00]);
	}

	#[test]
	fn status_with_payload() {
		let object = Object {
			status: ObjectStatus::EndOfTrack,
			payload: Bytes::from_static(b"oops"),
			..Default::default()
		};
		assert_eq!(encode_payload(&mut Vec::<u8>::new(), &object), Err(EncodeError::InvalidValue));
	}

	#[test]
	fn unknown_status() {
		let mut bytes = Bytes::from_static(&[0x00, 0x02]);
		assert_eq!(decode_payload(&mut bytes), Err(DecodeError::InvalidValue));
	}

	#[test]
	fn loc_view() {
		let mut object = Object::default();
		object.extensions.push(2, ExtensionValue::VarInt(5_000)).unwrap();
		assert_eq!(object.loc().unwrap().capture_timestamp.map(|t| t.as_millis()), Some(5));
		assert_eq!(object.location(), Location::new(0, 0));
	}
}
