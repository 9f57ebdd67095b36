//! Append-only per-conversation message records.

pub mod writer;

pub use writer::{ConversationLog, LogRecord};
