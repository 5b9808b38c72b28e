//! # moqt: a Media over QUIC Transport protocol engine
//!
//! `moqt` implements the messages and request lifecycle of draft-ietf-moq-transport-15.
//! Message bodies, data streams and datagrams follow the draft-15 layouts, but every control
//! frame is prefixed with a varint length rather than draft-15's 16-bit length. A draft-15 peer
//! can't parse those frames, so this crate only talks to itself.
//!
//! It performs no I/O: the transport delivers byte chunks and datagrams, and drains the encoded
//! control frames to send.
//!
//! The pieces are:
//! - [coding]: varints, length-prefixed values and incremental decoding.
//! - [ietf]: the control messages and their parameters.
//! - [data]: subgroup streams, fetch streams, datagrams and object extensions.
//! - [Session]: request ids, flow control and correlation of responses into [Event]s.
//! - [Dispatcher]: classifies each incoming stream and routes its bytes to the right decoder.
//!
//! A typical receive loop:
//! - Create a [Session] from a [SessionConfig] and wrap it in a [Dispatcher].
//! - Call [Session::connect] on the client.
//! - Feed every stream chunk to [Dispatcher::on_stream_bytes] and every datagram to [Dispatcher::on_datagram].
//! - Write each frame from [Session::poll_send] to the control stream, then call [Session::send_complete].

mod config;
mod dispatch;
mod error;
mod session;

pub mod coding;
pub mod data;
pub mod ietf;

pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use session::*;
