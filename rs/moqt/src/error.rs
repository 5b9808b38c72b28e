use crate::{
	coding::{DecodeError, EncodeError},
	ietf::{ErrorCode, RequestId},
};

/// A list of possible errors that can occur during the session.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("encode error: {0}")]
	Encode(#[from] EncodeError),

	/// The peer's MAX_REQUEST_ID does not allow another request.
	#[error("requests blocked at maximum={maximum}")]
	RequestBlocked { maximum: u64 },

	/// A response or cancellation for a request that is unknown or already terminal.
	#[error("unknown request: {0}")]
	UnknownRequest(RequestId),

	#[error("protocol violation: {0}")]
	ProtocolViolation(&'static str),

	#[error("duplicate track alias: {0}")]
	DuplicateTrackAlias(u64),

	/// An unexpected stream type was received
	#[error("unexpected stream type: {0:#x}")]
	UnexpectedStream(u64),

	#[error("unexpected message: {0:#x}")]
	UnexpectedMessage(u64),

	#[error("unsupported versions")]
	Version,

	/// GOAWAY was sent or received, so no new requests may be issued.
	#[error("draining")]
	Draining,

	#[error("closed")]
	Closed,

	/// The operation is not valid in the current session or request state.
	#[error("wrong state")]
	WrongState,

	#[error("stream reset code={0}")]
	StreamReset(u64),

	// The application closes the session or request with a code.
	#[error("app code={0}")]
	App(u64),
}

impl Error {
	/// The MOQT error code sent over the wire.
	pub fn to_code(&self) -> u64 {
		let code = match self {
			Self::Decode(_) | Self::ProtocolViolation(_) | Self::UnknownRequest(_) => ErrorCode::ProtocolViolation,
			Self::UnexpectedStream(_) | Self::UnexpectedMessage(_) | Self::Version => ErrorCode::ProtocolViolation,
			Self::DuplicateTrackAlias(_) => ErrorCode::DuplicateTrackAlias,
			Self::Encode(_) | Self::RequestBlocked { .. } | Self::WrongState => ErrorCode::Internal,
			Self::Draining | Self::Closed => ErrorCode::NoError,
			Self::StreamReset(code) | Self::App(code) => return *code,
		};

		code.into()
	}

	/// Returns true if the session can't continue after this error.
	///
	/// Decode errors are only fatal on the control stream; the dispatcher closes the session for those.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::ProtocolViolation(_) | Self::UnexpectedMessage(_) | Self::Version | Self::Closed
		)
	}
}

pub type Result<T> = std::result::Result<T, Error>;
