//! Wire encoding shared by the control and data planes.
//!
//! Every numeric field is a QUIC [VarInt]; [Reader] buffers partial stream reads until a full item is available.

mod decode;
mod encode;
mod reader;
pub mod varint;
mod version;

pub use decode::*;
pub use encode::*;
pub use reader::*;
pub use varint::VarInt;
pub use version::*;
