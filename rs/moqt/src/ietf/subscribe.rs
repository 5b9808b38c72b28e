//! Subscribe family: SUBSCRIBE, SUBSCRIBE_OK, SUBSCRIBE_UPDATE and UNSUBSCRIBE.

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
	coding::*,
	ietf::{Location, Message, MessageParameters, RequestId, TrackNamespace},
};

/// The order in which groups are delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u64)]
pub enum GroupOrder {
	Ascending = 0x1,
	Descending = 0x2,
}

impl<V> Encode<V> for GroupOrder {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		u64::from(*self).encode(w, version)
	}
}

impl<V> Decode<V> for GroupOrder {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		Self::try_from(u64::decode(r, version)?).map_err(|_| DecodeError::InvalidValue)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum FilterType {
	LatestGroup = 0x1,
	LatestObject = 0x2,
	AbsoluteStart = 0x3,
	AbsoluteRange = 0x4,
}

/// Which objects a subscription should deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionFilter {
	/// Start at the beginning of the next group.
	LatestGroup,

	/// Start at the next object.
	LatestObject,

	/// Start at the given location with no end.
	AbsoluteStart(Location),

	/// The inclusive range between two locations.
	AbsoluteRange(Location, Location),
}

impl SubscriptionFilter {
	pub fn filter_type(&self) -> FilterType {
		match self {
			Self::LatestGroup => FilterType::LatestGroup,
			Self::LatestObject => FilterType::LatestObject,
			Self::AbsoluteStart(_) => FilterType::AbsoluteStart,
			Self::AbsoluteRange(..) => FilterType::AbsoluteRange,
		}
	}

	/// Returns true if the location is delivered by this filter, ignoring the live edge.
	pub fn contains(&self, location: Location) -> bool {
		match self {
			Self::LatestGroup | Self::LatestObject => true,
			Self::AbsoluteStart(start) => location >= *start,
			Self::AbsoluteRange(start, end) => location >= *start && location <= *end,
		}
	}
}

impl<V: Clone> Encode<V> for SubscriptionFilter {
	fn encode<W: bytes::BufMut>(&self, w: &mut W, version: V) -> Result<(), EncodeError> {
		u64::from(self.filter_type()).encode(w, version.clone())?;

		match self {
			Self::LatestGroup | Self::LatestObject => Ok(()),
			Self::AbsoluteStart(start) => start.encode(w, version),
			Self::AbsoluteRange(start, end) => {
				if end < start {
					return Err(EncodeError::InvalidValue);
				}
				start.encode(w, version.clone())?;
				end.encode(w, version)
			}
		}
	}
}

impl<V: Clone> Decode<V> for SubscriptionFilter {
	fn decode<R: bytes::Buf>(r: &mut R, version: V) -> Result<Self, DecodeError> {
		let kind = u64::decode(r, version.clone())?;
		let kind = FilterType::try_from(kind).map_err(|_| DecodeError::InvalidValue)?;

		Ok(match kind {
			FilterType::LatestGroup => Self::LatestGroup,
			FilterType::LatestObject => Self::LatestObject,
			FilterType::AbsoluteStart => Self::AbsoluteStart(Location::decode(r, version)?),
			FilterType::AbsoluteRange => {
				let start = Location::decode(r, version.clone())?;
				let end = Location::decode(r, version)?;
				if end < start {
					return Err(DecodeError::InvalidValue);
				}
				Self::AbsoluteRange(start, end)
			}
		})
	}
}

/// Subscribe message (0x03)
/// Sent by the subscriber to request objects for the given track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribe {
	pub request_id: RequestId,
	pub track_alias: u64,
	pub track_namespace: TrackNamespace,
	pub track_name: Bytes,
	pub parameters: MessageParameters,
}

impl Message for Subscribe {
	const ID: u64 = 0x03;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.track_alias.encode(w, version)?;
		self.track_namespace.encode(w, version)?;
		self.track_name.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let track_alias = u64::decode(r, version)?;
		let track_namespace = TrackNamespace::decode(r, version)?;
		let track_name = Bytes::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;

		Ok(Self {
			request_id,
			track_alias,
			track_namespace,
			track_name,
			parameters,
		})
	}
}

/// SubscribeOk message (0x04)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscribeOk {
	pub request_id: RequestId,
	pub parameters: MessageParameters,
}

impl Message for SubscribeOk {
	const ID: u64 = 0x04;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;
		Ok(Self { request_id, parameters })
	}
}

/// SubscribeUpdate message (0x02)
/// Changes the filter, priority or forwarding state of an existing subscription.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscribeUpdate {
	pub request_id: RequestId,
	pub parameters: MessageParameters,
}

impl Message for SubscribeUpdate {
	const ID: u64 = 0x02;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		let parameters = MessageParameters::decode(r, version)?;
		Ok(Self { request_id, parameters })
	}
}

/// Unsubscribe message (0x0a)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsubscribe {
	pub request_id: RequestId,
}

impl Message for Unsubscribe {
	const ID: u64 = 0x0a;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.request_id.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let request_id = RequestId::decode(r, version)?;
		Ok(Self { request_id })
	}
}
