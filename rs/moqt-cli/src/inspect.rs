use std::io::Read;

use anyhow::Context;
use bytes::Bytes;
use clap::{Args, ValueEnum};
use moqt::{
	Dispatcher, Role, Session,
	coding::{Decoded, Version},
	ietf::ControlDecoder,
};

use crate::config::SessionArgs;

#[derive(Args, Clone, Debug)]
pub struct InspectArgs {
	/// How to interpret the bytes.
	#[arg(long, value_enum, default_value_t = Kind::Control)]
	pub kind: Kind,

	/// Hex encoded bytes, whitespace allowed. Read from stdin when omitted.
	pub hex: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
	/// Control frames, without the stream type.
	Control,

	/// A whole subgroup or fetch stream, starting with the stream type.
	Stream,

	/// A single object datagram.
	Datagram,
}

/// Decode the input and return one line per item.
pub fn inspect(args: &InspectArgs, session: &SessionArgs) -> anyhow::Result<Vec<String>> {
	let input = match &args.hex {
		Some(hex) => hex.clone(),
		None => {
			let mut input = String::new();
			std::io::stdin()
				.read_to_string(&mut input)
				.context("failed to read stdin")?;
			input
		}
	};

	let compact: String = input.split_whitespace().collect();
	let bytes = Bytes::from(hex::decode(compact).context("input is not valid hex")?);

	tracing::debug!(size = bytes.len(), kind = ?args.kind, "inspecting");

	match args.kind {
		Kind::Control => control(&bytes, !session.strict_messages),
		Kind::Stream => {
			let dispatcher = Dispatcher::new(Session::new(session.session_config(Role::Client)));
			let events = dispatcher
				.on_stream_bytes(0, &bytes, true)
				.context("failed to decode stream")?;
			Ok(events.iter().map(|event| format!("{event:?}")).collect())
		}
		Kind::Datagram => {
			let dispatcher = Dispatcher::new(Session::new(session.session_config(Role::Client)));
			let event = dispatcher.on_datagram(bytes).context("failed to decode datagram")?;
			Ok(vec![format!("{event:?}")])
		}
	}
}

fn control(bytes: &[u8], skip_unknown: bool) -> anyhow::Result<Vec<String>> {
	let decoder = ControlDecoder {
		version: Version::DRAFT_15,
		skip_unknown,
	};

	let mut lines = Vec::new();
	let mut offset = 0;

	while offset < bytes.len() {
		match decoder
			.try_decode_next(&bytes[offset..])
			.with_context(|| format!("invalid frame at offset {offset}"))?
		{
			Decoded::Item(msg, size) => {
				lines.push(format!("{:#04x} {msg:?}", msg.id()));
				offset += size;
			}
			Decoded::NeedMoreBytes => anyhow::bail!("truncated frame at offset {offset}"),
		}
	}

	Ok(lines)
}

#[cfg(test)]
mod tests {
	use super::*;
	use moqt::ietf::{ControlMessage, MaxRequestId, RequestId};

	fn args(kind: Kind, hex: &str) -> InspectArgs {
		InspectArgs {
			kind,
			hex: Some(hex.to_string()),
		}
	}

	#[test]
	fn control_frames() {
		let msg = ControlMessage::from(MaxRequestId {
			request_id: RequestId(9),
		});
		let frame = hex::encode(msg.encode_bytes(Version::DRAFT_15).unwrap());

		let lines = inspect(&args(Kind::Control, &format!("{frame} {frame}")), &SessionArgs::default()).unwrap();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].starts_with("0x15 MaxRequestId"));
	}

	#[test]
	fn truncated() {
		let err = inspect(&args(Kind::Control, "15 02 05"), &SessionArgs::default()).unwrap_err();
		assert!(err.to_string().contains("truncated"));
	}

	#[test]
	fn datagram() {
		// Type 0, alias 3, group 9, object 5, priority 0x40, payload "hi".
		let lines = inspect(&args(Kind::Datagram, "00 03 09 05 40 6869"), &SessionArgs::default()).unwrap();
		assert_eq!(lines.len(), 1);
		assert!(lines[0].starts_with("Datagram"));
	}

	#[test]
	fn not_hex() {
		assert!(inspect(&args(Kind::Stream, "zz"), &SessionArgs::default()).is_err());
	}
}
