use crate::{
	coding::*,
	ietf::{Message, Parameters},
};

/// Sent by the client to setup the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSetup {
	/// The list of supported versions in preferred order.
	pub versions: Versions,

	/// Extensions.
	pub parameters: Parameters,
}

impl Message for ClientSetup {
	const ID: u64 = 0x20;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.versions.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let versions = Versions::decode(r, version)?;
		let parameters = Parameters::decode(r, version)?;

		Ok(Self { versions, parameters })
	}
}

/// Sent by the server in response to a client setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSetup {
	/// The selected version.
	pub version: Version,

	/// Supported extensions.
	pub parameters: Parameters,
}

impl Message for ServerSetup {
	const ID: u64 = 0x21;

	fn encode_msg<W: bytes::BufMut>(&self, w: &mut W, version: Version) -> Result<(), EncodeError> {
		self.version.encode(w, version)?;
		self.parameters.encode(w, version)
	}

	fn decode_msg<R: bytes::Buf>(r: &mut R, version: Version) -> Result<Self, DecodeError> {
		let selected = Version::decode(r, version)?;
		let parameters = Parameters::decode(r, version)?;

		Ok(Self {
			version: selected,
			parameters,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ietf::{ParameterBytes, ParameterVarInt};
	use bytes::BytesMut;

	#[test]
	fn client_setup_wire() {
		let mut parameters = Parameters::default();
		parameters.set_bytes(ParameterBytes::Path, "/moq");
		parameters.set_varint(ParameterVarInt::MaxRequestId, 100);

		let msg = ClientSetup {
			versions: [Version::DRAFT_15].into(),
			parameters,
		};

		let mut buf = BytesMut::new();
		msg.encode_msg(&mut buf, Version::DRAFT_15).unwrap();

		#[rustfmt::skip]
		let expected = [
			0x01, 0xc0, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x0f, // versions
			0x02, // 2 parameters
			0x01, 0x04, b'/', b'm', b'o', b'q', // path
			0x02, 0x40, 0x64, // max request id
		];
		assert_eq!(buf.as_ref(), &expected);

		let mut bytes = buf.freeze();
		let decoded = ClientSetup::decode_msg(&mut bytes, Version::DRAFT_15).unwrap();
		assert_eq!(decoded, msg);
		assert_eq!(decoded.parameters.max_request_id(), Some(100));
	}

	#[test]
	fn server_setup_round_trip() {
		let msg = ServerSetup {
			version: Version::DRAFT_14,
			parameters: Parameters::default(),
		};

		let mut buf = BytesMut::new();
		msg.encode_msg(&mut buf, Version::DRAFT_15).unwrap();

		let mut bytes = buf.freeze();
		assert_eq!(ServerSetup::decode_msg(&mut bytes, Version::DRAFT_15).unwrap(), msg);
	}
}
