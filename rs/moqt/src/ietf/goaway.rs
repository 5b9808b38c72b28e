use crate::{coding::*, ietf::Message};

/// Sent to ask the peer to migrate to a new session.
///
/// An empty URI means the peer should reconnect to the same endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoAway {
	pub new_session_uri: String,
}

impl Message for GoAway {
	const ID: u64 = 0x10;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.new_session_uri.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let new_session_uri = String::decode(r, version)?;
		Ok(Self { new_session_uri })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bytes::BytesMut;

	#[test]
	fn empty_uri() {
		let mut buf = BytesMut::new();
		GoAway::default().encode_msg(&mut buf, Version::DRAFT_15).unwrap();
		assert_eq!(buf.as_ref(), &[0x00]);

		let mut bytes = buf.freeze();
		assert_eq!(GoAway::decode_msg(&mut bytes, Version::DRAFT_15).unwrap(), GoAway::default());
	}
}
