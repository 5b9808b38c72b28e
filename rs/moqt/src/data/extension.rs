use bytes::{Buf, Bytes};

use crate::{coding::*, data::LocType};

/// How to treat extension types outside the LOC registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ExtensionPolicy {
	/// Keep unknown types as opaque values so they round-trip.
	#[default]
	Preserve,

	/// Fail with [DecodeError::UnknownExtensionType].
	Strict,
}

/// The value of a single header extension.
///
/// Even types carry a varint, odd types carry length-prefixed bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtensionValue {
	VarInt(u64),
	Bytes(Bytes),

	/// The varint of an unknown even type, exactly as it was encoded.
	Raw(Bytes),
}

impl ExtensionValue {
	pub fn as_varint(&self) -> Option<u64> {
		match self {
			Self::VarInt(v) => Some(*v),
			Self::Raw(raw) => u64::decode(&mut raw.clone(), ()).ok(),
			Self::Bytes(_) => None,
		}
	}

	pub fn as_bytes(&self) -> Option<&Bytes> {
		match self {
			Self::Bytes(b) => Some(b),
			Self::VarInt(_) | Self::Raw(_) => None,
		}
	}

	fn matches(&self, kind: u64) -> bool {
		match self {
			Self::VarInt(_) => kind % 2 == 0,
			Self::Raw(raw) => kind % 2 == 0 && is_single_varint(raw),
			Self::Bytes(_) => kind % 2 == 1,
		}
	}
}

fn is_single_varint(raw: &Bytes) -> bool {
	let mut buf = raw.clone();
	u64::decode(&mut buf, ()).is_ok() && !buf.has_remaining()
}

/// The header extensions attached to an object, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extensions(Vec<(u64, ExtensionValue)>);

impl Extensions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append an extension, keeping any existing value of the same type.
	///
	/// The value must match the parity of the type, and a [ExtensionValue::Raw] must hold one varint.
	pub fn push(&mut self, kind: u64, value: ExtensionValue) -> Result<(), EncodeError> {
		if !value.matches(kind) {
			return Err(EncodeError::InvalidValue);
		}
		self.0.push((kind, value));
		Ok(())
	}

	/// Replace the first extension of this type, or append it.
	pub fn set(&mut self, kind: u64, value: ExtensionValue) -> Result<(), EncodeError> {
		if !value.matches(kind) {
			return Err(EncodeError::InvalidValue);
		}

		match self.0.iter_mut().find(|(k, _)| *k == kind) {
			Some(existing) => existing.1 = value,
			None => self.0.push((kind, value)),
		}
		Ok(())
	}

	/// The first value with this type.
	pub fn get(&self, kind: u64) -> Option<&ExtensionValue> {
		self.0.iter().find(|(k, _)| *k == kind).map(|(_, v)| v)
	}

	pub fn remove(&mut self, kind: u64) -> Option<ExtensionValue> {
		let index = self.0.iter().position(|(k, _)| *k == kind)?;
		Some(self.0.remove(index).1)
	}

	pub fn iter(&self) -> impl Iterator<Item = (u64, &ExtensionValue)> {
		self.0.iter().map(|(k, v)| (*k, v))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Decode the length-prefixed block, applying the given policy to unknown types.
	pub fn decode_with<R: Buf>(r: &mut R, policy: ExtensionPolicy) -> Result<Self, DecodeError> {
		let size = usize::decode(r, ())?;
		let mut block = decode_exact(r, size)?;

		// The block has arrived in full, so running out of bytes inside it is malformed.
		match Self::decode_block(&mut block, policy) {
			Err(DecodeError::Truncated) => Err(DecodeError::Malformed),
			res => res,
		}
	}

	fn decode_block(block: &mut Bytes, policy: ExtensionPolicy) -> Result<Self, DecodeError> {
		let mut extensions = Vec::new();

		while block.has_remaining() {
			let kind = u64::decode(block, ())?;

			let known = LocType::try_from(kind).is_ok();
			if policy == ExtensionPolicy::Strict && !known {
				return Err(DecodeError::UnknownExtensionType(kind));
			}

			let value = match kind % 2 {
				0 if known => ExtensionValue::VarInt(u64::decode(block, ())?),
				0 => {
					// Keep the encoding, which may not be the minimal one.
					let start = block.clone();
					u64::decode(block, ())?;
					ExtensionValue::Raw(start.slice(..start.len() - block.remaining()))
				}
				_ => ExtensionValue::Bytes(Bytes::decode(block, ())?),
			};

			extensions.push((kind, value));
		}

		Ok(Self(extensions))
	}
}

impl<V> Encode<V> for Extensions {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, _: V) -> Result<(), EncodeError> {
		let mut block: Vec<u8> = Vec::new();

		for (kind, value) in &self.0 {
			if !value.matches(*kind) {
				return Err(EncodeError::InvalidValue);
			}

			kind.encode(&mut block, ())?;
			match value {
				ExtensionValue::VarInt(v) => v.encode(&mut block, ())?,
				ExtensionValue::Bytes(b) => b.encode(&mut block, ())?,
				ExtensionValue::Raw(raw) => block.extend_from_slice(raw),
			}
		}

		block.len().encode(w, ())?;
		w.put_slice(&block);

		Ok(())
	}
}

impl<V> Decode<V> for Extensions {
	fn decode<R: Buf>(r: &mut R, _: V) -> Result<Self, DecodeError> {
		Self::decode_with(r, ExtensionPolicy::Preserve)
	}
}

impl FromIterator<(u64, ExtensionValue)> for Extensions {
	fn from_iter<T: IntoIterator<Item = (u64, ExtensionValue)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	// Encode a varint in the given class, even when a shorter one would do.
	fn encode_class(v: u64, class: usize) -> Bytes {
		match class {
			1 => Bytes::copy_from_slice(&[v as u8]),
			2 => Bytes::copy_from_slice(&((v as u16) | 0x4000).to_be_bytes()),
			4 => Bytes::copy_from_slice(&((v as u32) | 0x8000_0000).to_be_bytes()),
			_ => Bytes::copy_from_slice(&(v | 0xc000_0000_0000_0000).to_be_bytes()),
		}
	}

	fn value_strategy(kind: u64) -> BoxedStrategy<ExtensionValue> {
		if kind % 2 == 1 {
			proptest::collection::vec(any::<u8>(), 0..32)
				.prop_map(|v| ExtensionValue::Bytes(v.into()))
				.boxed()
		} else if LocType::try_from(kind).is_ok() {
			(0..=VarInt::MAX.into_inner()).prop_map(ExtensionValue::VarInt).boxed()
		} else {
			(0..=VarInt::MAX.into_inner(), prop::sample::select(vec![1usize, 2, 4, 8]))
				.prop_map(|(v, class)| {
					let class = class.max(crate::coding::varint::size(v));
					ExtensionValue::Raw(encode_class(v, class))
				})
				.boxed()
		}
	}

	fn extensions_strategy() -> impl Strategy<Value = Extensions> {
		let kind = prop_oneof![0u64..16, 0u64..10_000];
		let pair = kind.prop_flat_map(|kind| value_strategy(kind).prop_map(move |v| (kind, v)));
		proptest::collection::vec(pair, 0..8).prop_map(|pairs| pairs.into_iter().collect())
	}

	proptest! {
		#[test]
		fn round_trip(extensions in extensions_strategy()) {
			let encoded = extensions.encode_bytes(()).unwrap();
			let mut buf = encoded.clone();
			let decoded = Extensions::decode(&mut buf, ()).unwrap();
			prop_assert_eq!(&decoded, &extensions);
			prop_assert!(buf.is_empty());

			// Byte for byte, including unknown types.
			prop_assert_eq!(decoded.encode_bytes(()).unwrap(), encoded);
		}

		#[test]
		fn truncated_prefix(extensions in extensions_strategy()) {
			let encoded = extensions.encode_bytes(()).unwrap();
			for len in 0..encoded.len() {
				let mut buf = encoded.slice(..len);
				prop_assert_eq!(Extensions::decode(&mut buf, ()), Err(DecodeError::Truncated));
			}
		}
	}

	#[test]
	fn wire() {
		let mut extensions = Extensions::new();
		extensions.push(2, ExtensionValue::VarInt(1000)).unwrap();
		extensions
			.push(13, ExtensionValue::Bytes(Bytes::from_static(&[0xaa, 0xbb])))
			.unwrap();

		#[rustfmt::skip]
		let expected = [
			0x07, // block length
			0x02, 0x43, 0xe8, // capture timestamp
			0x0d, 0x02, 0xaa, 0xbb, // video config
		];
		assert_eq!(extensions.encode_bytes(()).unwrap().as_ref(), &expected);
	}

	#[test]
	fn parity_mismatch() {
		let mut extensions = Extensions::new();
		assert_eq!(
			extensions.push(2, ExtensionValue::Bytes(Bytes::new())),
			Err(EncodeError::InvalidValue)
		);
		assert_eq!(extensions.push(3, ExtensionValue::VarInt(1)), Err(EncodeError::InvalidValue));
		assert!(extensions.is_empty());
	}

	#[test]
	fn block_overrun() {
		// Declares 2 bytes, but the odd type claims a 5 byte value.
		let mut buf = Bytes::from_static(&[0x02, 0x03, 0x05, 0x00, 0x00]);
		assert_eq!(Extensions::decode(&mut buf, ()), Err(DecodeError::Malformed));

		// Declares 1 byte, which holds a type but no value.
		let mut buf = Bytes::from_static(&[0x01, 0x02]);
		assert_eq!(Extensions::decode(&mut buf, ()), Err(DecodeError::Malformed));
	}

	#[test]
	fn strict_policy() {
		let mut extensions = Extensions::new();
		extensions.push(2, ExtensionValue::VarInt(5)).unwrap();
		extensions.push(0x40, ExtensionValue::VarInt(1)).unwrap();
		let encoded = extensions.encode_bytes(()).unwrap();

		let mut buf = encoded.clone();
		assert_eq!(
			Extensions::decode_with(&mut buf, ExtensionPolicy::Strict),
			Err(DecodeError::UnknownExtensionType(0x40))
		);

		let mut buf = encoded;
		let preserved = Extensions::decode_with(&mut buf, ExtensionPolicy::Preserve).unwrap();
		assert_eq!(preserved.get(2), Some(&ExtensionValue::VarInt(5)));
		assert_eq!(preserved.get(0x40).and_then(ExtensionValue::as_varint), Some(1));
	}

	#[test]
	fn unknown_keeps_encoding() {
		// Type 8 holds 5 in a two byte varint.
		let encoded = Bytes::from_static(&[0x03, 0x08, 0x40, 0x05]);

		let mut buf = encoded.clone();
		let extensions = Extensions::decode(&mut buf, ()).unwrap();
		assert_eq!(
			extensions.get(8),
			Some(&ExtensionValue::Raw(Bytes::from_static(&[0x40, 0x05])))
		);
		assert_eq!(extensions.get(8).and_then(ExtensionValue::as_varint), Some(5));
		assert_eq!(extensions.encode_bytes(()).unwrap(), encoded);
	}

	#[test]
	fn raw_must_be_one_varint() {
		let mut extensions = Extensions::new();
		assert_eq!(
			extensions.push(8, ExtensionValue::Raw(Bytes::from_static(&[0x40]))),
			Err(EncodeError::InvalidValue)
		);
		assert_eq!(
			extensions.push(8, ExtensionValue::Raw(Bytes::from_static(&[0x01, 0x02]))),
			Err(EncodeError::InvalidValue)
		);
		assert_eq!(
			extensions.push(9, ExtensionValue::Raw(Bytes::from_static(&[0x01]))),
			Err(EncodeError::InvalidValue)
		);
		extensions.push(8, ExtensionValue::Raw(Bytes::from_static(&[0x80, 0, 0, 0x01]))).unwrap();
	}

	#[test]
	fn set_replaces() {
		let mut extensions = Extensions::new();
		extensions.set(4, ExtensionValue::VarInt(1)).unwrap();
		extensions.set(4, ExtensionValue::VarInt(2)).unwrap();
		assert_eq!(extensions.len(), 1);
		assert_eq!(extensions.get(4).and_then(ExtensionValue::as_varint), Some(2));
		assert_eq!(extensions.remove(4), Some(ExtensionValue::VarInt(2)));
		assert!(extensions.get(4).is_none());
	}
}
