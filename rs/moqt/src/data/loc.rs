//! Low Overhead Container (LOC) header extensions.
//!
//! These are carried as ordinary [Extensions] and converted with [LocHeaders].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
	coding::*,
	data::{ExtensionValue, Extensions},
};

/// The registered LOC extension types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u64)]
pub enum LocType {
	CaptureTimestamp = 2,
	VideoFrameMarking = 4,
	AudioLevel = 6,
	VideoConfig = 13,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("time overflow")]
pub struct TimeOverflow;

/// Wall clock time the media was captured, in microseconds since the Unix epoch.
///
/// Constrained to fit within a varint.
#[derive(Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureTimestamp(VarInt);

impl CaptureTimestamp {
	pub const ZERO: Self = Self(VarInt::ZERO);

	pub const fn from_micros(micros: u64) -> Result<Self, TimeOverflow> {
		match VarInt::from_u64(micros) {
			Some(v) => Ok(Self(v)),
			None => Err(TimeOverflow),
		}
	}

	pub const fn from_millis(millis: u64) -> Result<Self, TimeOverflow> {
		match millis.checked_mul(1000) {
			Some(micros) => Self::from_micros(micros),
			None => Err(TimeOverflow),
		}
	}

	pub const fn as_micros(self) -> u64 {
		self.0.into_inner()
	}

	/// Truncates to whole milliseconds.
	pub const fn as_millis(self) -> u64 {
		self.0.into_inner() / 1000
	}

	pub fn now() -> Self {
		let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
		Self::try_from(elapsed).unwrap_or(Self(VarInt::MAX))
	}
}

impl TryFrom<Duration> for CaptureTimestamp {
	type Error = TimeOverflow;

	fn try_from(duration: Duration) -> Result<Self, Self::Error> {
		let micros = u64::try_from(duration.as_micros()).map_err(|_| TimeOverflow)?;
		Self::from_micros(micros)
	}
}

impl From<CaptureTimestamp> for Duration {
	fn from(ts: CaptureTimestamp) -> Self {
		Duration::from_micros(ts.as_micros())
	}
}

impl std::fmt::Debug for CaptureTimestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}us", self.as_micros())
	}
}

/// Video frame metadata, packed into the low byte of a varint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VideoFrameMarking {
	/// The frame can be decoded without reference to any other (a keyframe).
	pub independent: bool,
	pub discardable: bool,
	pub base_layer_sync: bool,

	/// 3 bits.
	pub temporal_id: u8,

	/// 2 bits.
	pub spatial_id: u8,
}

impl VideoFrameMarking {
	pub fn to_bits(&self) -> u64 {
		let mut bits = 0;
		if self.independent {
			bits |= 0x01;
		}
		if self.discardable {
			bits |= 0x02;
		}
		if self.base_layer_sync {
			bits |= 0x04;
		}
		bits |= ((self.temporal_id & 0x07) as u64) << 3;
		bits |= ((self.spatial_id & 0x03) as u64) << 6;
		bits
	}

	pub fn from_bits(bits: u64) -> Self {
		Self {
			independent: bits & 0x01 != 0,
			discardable: bits & 0x02 != 0,
			base_layer_sync: bits & 0x04 != 0,
			temporal_id: ((bits >> 3) & 0x07) as u8,
			spatial_id: ((bits >> 6) & 0x03) as u8,
		}
	}
}

/// Audio level of the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AudioLevel {
	pub voice_activity: bool,

	/// 0 to 127, where 0 is the loudest.
	pub level: u8,
}

impl AudioLevel {
	pub fn to_bits(&self) -> u64 {
		let mut bits = (self.level & 0x7f) as u64;
		if self.voice_activity {
			bits |= 0x80;
		}
		bits
	}

	pub fn from_bits(bits: u64) -> Self {
		Self {
			voice_activity: bits & 0x80 != 0,
			level: (bits & 0x7f) as u8,
		}
	}
}

/// Codec specific configuration, ex. an AVCDecoderConfigurationRecord.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoConfig(pub Bytes);

/// The typed LOC view of an object's extensions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocHeaders {
	pub capture_timestamp: Option<CaptureTimestamp>,
	pub video_frame_marking: Option<VideoFrameMarking>,
	pub audio_level: Option<AudioLevel>,
	pub video_config: Option<VideoConfig>,

	/// Extensions outside the LOC registry, retained in order.
	pub other: Extensions,
}

impl LocHeaders {
	pub fn from_extensions(extensions: &Extensions) -> Result<Self, DecodeError> {
		let mut headers = Self::default();

		for (kind, value) in extensions.iter() {
			let Ok(loc) = LocType::try_from(kind) else {
				headers
					.other
					.push(kind, value.clone())
					.map_err(|_| DecodeError::InvalidValue)?;
				continue;
			};

			match loc {
				LocType::CaptureTimestamp => {
					let v = value.as_varint().ok_or(DecodeError::InvalidValue)?;
					headers.capture_timestamp =
						Some(CaptureTimestamp::from_micros(v).map_err(|_| DecodeError::BoundsExceeded)?);
				}
				LocType::VideoFrameMarking => {
					let v = value.as_varint().ok_or(DecodeError::InvalidValue)?;
					headers.video_frame_marking = Some(VideoFrameMarking::from_bits(v));
				}
				LocType::AudioLevel => {
					let v = value.as_varint().ok_or(DecodeError::InvalidValue)?;
					headers.audio_level = Some(AudioLevel::from_bits(v));
				}
				LocType::VideoConfig => {
					let b = value.as_bytes().ok_or(DecodeError::InvalidValue)?;
					headers.video_config = Some(VideoConfig(b.clone()));
				}
			}
		}

		Ok(headers)
	}

	/// LOC types first, in registry order, followed by the retained unknown types.
	pub fn to_extensions(&self) -> Extensions {
		let mut loc: Vec<(u64, ExtensionValue)> = Vec::new();

		if let Some(ts) = self.capture_timestamp {
			loc.push((LocType::CaptureTimestamp.into(), ExtensionValue::VarInt(ts.as_micros())));
		}
		if let Some(marking) = &self.video_frame_marking {
			loc.push((LocType::VideoFrameMarking.into(), ExtensionValue::VarInt(marking.to_bits())));
		}
		if let Some(level) = &self.audio_level {
			loc.push((LocType::AudioLevel.into(), ExtensionValue::VarInt(level.to_bits())));
		}
		if let Some(config) = &self.video_config {
			loc.push((LocType::VideoConfig.into(), ExtensionValue::Bytes(config.0.clone())));
		}

		loc.into_iter()
			.chain(self.other.iter().map(|(k, v)| (k, v.clone())))
			.collect()
	}
}
