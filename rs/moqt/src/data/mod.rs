//! The data plane: subgroup streams, fetch streams, datagrams and the extensions on each object.

mod datagram;
mod extension;
mod fetch;
mod loc;
mod object;
mod stream;
mod subgroup;

pub use datagram::*;
pub use extension::*;
pub use fetch::*;
pub use loc::*;
pub use object::{Object, ObjectStatus};
pub use stream::*;
pub use subgroup::*;

pub(crate) use object::{decode_payload, encode_payload};
