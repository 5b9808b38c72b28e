use crate::data::{FetchHeader, SubgroupHeader};

/// The first varint on every stream, fixed for the stream's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamType {
	Control,

	/// One of the subgroup header types, which also carries the header flags.
	Subgroup(u64),
	Fetch,
}

impl StreamType {
	pub const CONTROL: u64 = 0x00;

	pub fn id(&self) -> u64 {
		match self {
			Self::Control => Self::CONTROL,
			Self::Subgroup(kind) => *kind,
			Self::Fetch => FetchHeader::STREAM_TYPE,
		}
	}
}

impl TryFrom<u64> for StreamType {
	type Error = u64;

	fn try_from(kind: u64) -> Result<Self, Self::Error> {
		match kind {
			Self::CONTROL => Ok(Self::Control),
			FetchHeader::STREAM_TYPE => Ok(Self::Fetch),
			kind if SubgroupHeader::is_type(kind) => Ok(Self::Subgroup(kind)),
			kind => Err(kind),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classify() {
		assert_eq!(StreamType::try_from(0x00), Ok(StreamType::Control));
		assert_eq!(StreamType::try_from(0x05), Ok(StreamType::Fetch));
		assert_eq!(StreamType::try_from(0x1d), Ok(StreamType::Subgroup(0x1d)));
		assert_eq!(StreamType::try_from(0x16), Err(0x16));
		assert_eq!(StreamType::try_from(0x01), Err(0x01));

		for kind in [0x00, 0x05, 0x10, 0x3d] {
			assert_eq!(StreamType::try_from(kind).map(|t| t.id()), Ok(kind));
		}
	}
}
