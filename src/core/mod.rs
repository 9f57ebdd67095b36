//! Core types and errors shared across bridge modules.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{now, Message, MessageContent, MessageRole, Timestamp};
