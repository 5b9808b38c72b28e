use std::collections::{BTreeMap, btree_map};

use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::{
	coding::*,
	ietf::{GroupOrder, Location, SubscriptionFilter},
};

const MAX_PARAMS: u64 = 64;

// Even types carry a varint, odd types carry length-prefixed bytes.
// BTreeMap keeps the wire order deterministic (ascending by type).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
struct ParameterMap {
	vars: BTreeMap<u64, u64>,
	bytes: BTreeMap<u64, Bytes>,
}

impl ParameterMap {
	fn len(&self) -> usize {
		self.vars.len() + self.bytes.len()
	}
}

impl<V: Clone> Decode<V> for ParameterMap {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let mut vars = BTreeMap::new();
		let mut bytes = BTreeMap::new();

		let count = u64::decode(r, version.clone())?;

		if count > MAX_PARAMS {
			return Err(DecodeError::TooMany);
		}

		for _ in 0..count {
			let kind = u64::decode(r, version.clone())?;

			if kind % 2 == 0 {
				let value = u64::decode(r, version.clone())?;
				match vars.entry(kind) {
					btree_map::Entry::Occupied(_) => return Err(DecodeError::Duplicate),
					btree_map::Entry::Vacant(entry) => entry.insert(value),
				};
			} else {
				let value = Bytes::decode(r, version.clone())?;
				match bytes.entry(kind) {
					btree_map::Entry::Occupied(_) => return Err(DecodeError::Duplicate),
					btree_map::Entry::Vacant(entry) => entry.insert(value),
				};
			}
		}

		Ok(Self { vars, bytes })
	}
}

impl<V: Clone> Encode<V> for ParameterMap {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		if self.len() as u64 > MAX_PARAMS {
			return Err(EncodeError::TooMany);
		}

		self.len().encode(w, version.clone())?;

		let mut vars = self.vars.iter().peekable();
		let mut bytes = self.bytes.iter().peekable();

		// Merge the two sorted maps so types are written in ascending order.
		loop {
			let var_next = match (vars.peek(), bytes.peek()) {
				(Some((a, _)), Some((b, _))) => a < b,
				(Some(_), None) => true,
				(None, Some(_)) => false,
				(None, None) => break,
			};

			if var_next {
				if let Some((kind, value)) = vars.next() {
					kind.encode(w, version.clone())?;
					value.encode(w, version.clone())?;
				}
			} else if let Some((kind, value)) = bytes.next() {
				kind.encode(w, version.clone())?;
				value.encode(w, version.clone())?;
			}
		}

		Ok(())
	}
}

// ---- Setup Parameters (used in CLIENT_SETUP/SERVER_SETUP) ----

#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum ParameterVarInt {
	MaxRequestId = 2,
	MaxAuthTokenCacheSize = 4,
	#[num_enum(catch_all)]
	Unknown(u64),
}

#[derive(Debug, Copy, Clone, FromPrimitive, IntoPrimitive, Eq, Hash, PartialEq)]
#[repr(u64)]
pub enum ParameterBytes {
	Path = 1,
	AuthorizationToken = 3,
	Authority = 5,
	Implementation = 7,
	#[num_enum(catch_all)]
	Unknown(u64),
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters(ParameterMap);

impl<V: Clone> Decode<V> for Parameters {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		ParameterMap::decode(r, version).map(Self)
	}
}

impl<V: Clone> Encode<V> for Parameters {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		self.0.encode(w, version)
	}
}

impl Parameters {
	pub fn get_varint(&self, kind: ParameterVarInt) -> Option<u64> {
		self.0.vars.get(&u64::from(kind)).copied()
	}

	pub fn set_varint(&mut self, kind: ParameterVarInt, value: u64) {
		self.0.vars.insert(kind.into(), value);
	}

	pub fn get_bytes(&self, kind: ParameterBytes) -> Option<&[u8]> {
		self.0.bytes.get(&u64::from(kind)).map(|v| v.as_ref())
	}

	pub fn set_bytes(&mut self, kind: ParameterBytes, value: impl Into<Bytes>) {
		self.0.bytes.insert(kind.into(), value.into());
	}

	pub fn path(&self) -> Option<String> {
		self.get_bytes(ParameterBytes::Path)
			.map(|v| String::from_utf8_lossy(v).into_owned())
	}

	pub fn max_request_id(&self) -> Option<u64> {
		self.get_varint(ParameterVarInt::MaxRequestId)
	}
}

// ---- Message Parameters (used in Subscribe, Publish, Fetch, etc.) ----
// Uses raw u64 keys since parameter IDs have different meanings from setup parameters.

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MessageParameters(ParameterMap);

impl<V: Clone> Decode<V> for MessageParameters {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		ParameterMap::decode(r, version).map(Self)
	}
}

impl<V: Clone> Encode<V> for MessageParameters {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		self.0.encode(w, version)
	}
}

impl MessageParameters {
	// Varint parameter IDs (even)
	const DELIVERY_TIMEOUT: u64 = 0x02;
	const MAX_CACHE_DURATION: u64 = 0x04;
	const EXPIRES: u64 = 0x08;
	const PUBLISHER_PRIORITY: u64 = 0x0e;
	const FORWARD: u64 = 0x10;
	const SUBSCRIBER_PRIORITY: u64 = 0x20;
	const GROUP_ORDER: u64 = 0x22;
	const DYNAMIC_GROUPS: u64 = 0x30;

	// Bytes parameter IDs (odd)
	const AUTHORIZATION_TOKEN: u64 = 0x03;
	const LARGEST_OBJECT: u64 = 0x09;
	const SUBSCRIPTION_FILTER: u64 = 0x21;

	pub fn is_empty(&self) -> bool {
		self.0.len() == 0
	}

	pub fn get_varint(&self, kind: u64) -> Option<u64> {
		self.0.vars.get(&kind).copied()
	}

	pub fn get_bytes(&self, kind: u64) -> Option<&Bytes> {
		self.0.bytes.get(&kind)
	}

	// --- Varint accessors ---

	/// Delivery timeout in milliseconds.
	pub fn delivery_timeout(&self) -> Option<u64> {
		self.get_varint(Self::DELIVERY_TIMEOUT)
	}

	pub fn set_delivery_timeout(&mut self, v: u64) {
		self.0.vars.insert(Self::DELIVERY_TIMEOUT, v);
	}

	/// Max cache duration in milliseconds.
	pub fn max_cache_duration(&self) -> Option<u64> {
		self.get_varint(Self::MAX_CACHE_DURATION)
	}

	pub fn set_max_cache_duration(&mut self, v: u64) {
		self.0.vars.insert(Self::MAX_CACHE_DURATION, v);
	}

	/// Subscription lifetime in milliseconds, 0 meaning no expiry.
	pub fn expires(&self) -> Option<u64> {
		self.get_varint(Self::EXPIRES)
	}

	pub fn set_expires(&mut self, v: u64) {
		self.0.vars.insert(Self::EXPIRES, v);
	}

	pub fn publisher_priority(&self) -> Option<u8> {
		self.get_varint(Self::PUBLISHER_PRIORITY).map(|v| v as u8)
	}

	pub fn set_publisher_priority(&mut self, v: u8) {
		self.0.vars.insert(Self::PUBLISHER_PRIORITY, v as u64);
	}

	pub fn forward(&self) -> Option<bool> {
		self.get_varint(Self::FORWARD).map(|v| v != 0)
	}

	pub fn set_forward(&mut self, v: bool) {
		self.0.vars.insert(Self::FORWARD, v as u64);
	}

	pub fn subscriber_priority(&self) -> Option<u8> {
		self.get_varint(Self::SUBSCRIBER_PRIORITY).map(|v| v as u8)
	}

	pub fn set_subscriber_priority(&mut self, v: u8) {
		self.0.vars.insert(Self::SUBSCRIBER_PRIORITY, v as u64);
	}

	pub fn group_order(&self) -> Option<GroupOrder> {
		GroupOrder::try_from(self.get_varint(Self::GROUP_ORDER)?).ok()
	}

	pub fn set_group_order(&mut self, v: GroupOrder) {
		self.0.vars.insert(Self::GROUP_ORDER, v.into());
	}

	pub fn dynamic_groups(&self) -> Option<bool> {
		self.get_varint(Self::DYNAMIC_GROUPS).map(|v| v != 0)
	}

	pub fn set_dynamic_groups(&mut self, v: bool) {
		self.0.vars.insert(Self::DYNAMIC_GROUPS, v as u64);
	}

	// --- Bytes accessors ---

	pub fn authorization_token(&self) -> Option<&Bytes> {
		self.get_bytes(Self::AUTHORIZATION_TOKEN)
	}

	pub fn set_authorization_token(&mut self, token: impl Into<Bytes>) {
		self.0.bytes.insert(Self::AUTHORIZATION_TOKEN, token.into());
	}

	/// Get largest object location (encoded as group_id varint + object_id varint)
	pub fn largest_object(&self) -> Option<Location> {
		let mut buf = self.get_bytes(Self::LARGEST_OBJECT)?.clone();
		Location::decode(&mut buf, ()).ok()
	}

	pub fn set_largest_object(&mut self, loc: Location) -> Result<(), EncodeError> {
		let buf = loc.encode_bytes(())?;
		self.0.bytes.insert(Self::LARGEST_OBJECT, buf);
		Ok(())
	}

	/// Get subscription filter (encoded as filter_type varint [+ locations])
	pub fn subscription_filter(&self) -> Option<SubscriptionFilter> {
		let mut buf = self.get_bytes(Self::SUBSCRIPTION_FILTER)?.clone();
		SubscriptionFilter::decode(&mut buf, ()).ok()
	}

	pub fn set_subscription_filter(&mut self, filter: SubscriptionFilter) -> Result<(), EncodeError> {
		let buf = filter.encode_bytes(())?;
		self.0.bytes.insert(Self::SUBSCRIPTION_FILTER, buf);
		Ok(())
	}
}
