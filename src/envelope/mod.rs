//! External envelope wire format and conversation path trace.

pub mod codec;
pub mod path;

pub use codec::{decode, encode, is_envelope, DecodedEnvelope};
pub use path::append_hop;
