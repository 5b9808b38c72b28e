//! Control messages for draft-ietf-moq-transport-15.
//!
//! Every message implements [Message] for its body, and [ControlMessage] handles the framing.

mod fetch;
mod goaway;
mod location;
mod message;
mod namespace;
mod parameters;
mod publish;
mod publish_namespace;
mod request;
mod setup;
mod subscribe;
mod subscribe_namespace;
mod track;

pub use fetch::*;
pub use goaway::*;
pub use location::*;
pub use message::*;
pub use namespace::*;
pub use parameters::*;
pub use publish::*;
pub use publish_namespace::*;
pub use request::*;
pub use setup::*;
pub use subscribe::*;
pub use subscribe_namespace::*;
pub use track::*;
