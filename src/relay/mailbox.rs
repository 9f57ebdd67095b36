//! Single-slot latest-message mailbox.
//!
//! Last-write-wins storage for the most recent UI-destined message, with a
//! destructive take so simple polling clients get each message at most once.
//! Optionally file-backed, mirroring the `latest_message.json` slot the UI
//! wrapper polls.

use crate::core::{now, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// The slot payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestMessage {
    /// Display text
    pub message: String,
    /// Bridge the message came from
    pub from_agent: String,
    /// Human-readable sender name, when the registry knows one
    pub sender_name: Option<String>,
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// When the bridge received it
    pub timestamp: Timestamp,
}

impl LatestMessage {
    /// Create a slot payload stamped with the current time.
    pub fn new(message: &str, from_agent: &str, conversation_id: &str) -> Self {
        Self {
            message: message.to_string(),
            from_agent: from_agent.to_string(),
            sender_name: None,
            conversation_id: conversation_id.to_string(),
            timestamp: now(),
        }
    }

    /// Attach a sender display name.
    pub fn with_sender_name(mut self, name: &str) -> Self {
        self.sender_name = Some(name.to_string());
        self
    }
}

/// Single-slot mailbox, in-memory or file-backed.
pub struct LatestMailbox {
    slot: Mutex<Option<LatestMessage>>,
    file: Option<PathBuf>,
}

impl LatestMailbox {
    /// Create an in-memory mailbox.
    pub fn in_memory() -> Self {
        Self {
            slot: Mutex::new(None),
            file: None,
        }
    }

    /// Create a mailbox persisted at `path`.
    ///
    /// The file is the slot: it is overwritten on every set and removed once
    /// consumed, so it survives process restarts between the two.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            slot: Mutex::new(None),
            file: Some(path.into()),
        }
    }

    /// Overwrite the slot with `message` (last write wins).
    pub fn set(&self, message: LatestMessage) {
        if let Some(path) = &self.file {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if let Err(e) = std::fs::write(path, json) {
                        warn!(path = %path.display(), error = %e, "failed to persist latest message");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize latest message"),
            }
        }
        *self.slot.lock().expect("mailbox lock poisoned") = Some(message);
    }

    /// Take the slot contents, clearing it.
    pub fn take(&self) -> Option<LatestMessage> {
        let taken = self.slot.lock().expect("mailbox lock poisoned").take();
        if let Some(path) = &self.file {
            // Fall back to the file when the in-memory slot is cold, e.g.
            // a fresh process polling a slot written by a previous one.
            let from_file = taken.or_else(|| {
                std::fs::read_to_string(path)
                    .ok()
                    .and_then(|json| serde_json::from_str(&json).ok())
            });
            if from_file.is_some() {
                if let Err(e) = std::fs::remove_file(path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %e, "failed to clear latest message file");
                    }
                }
            }
            return from_file;
        }
        taken
    }

    /// Whether the slot currently holds a message.
    pub fn is_set(&self) -> bool {
        if self.slot.lock().expect("mailbox lock poisoned").is_some() {
            return true;
        }
        self.file.as_deref().is_some_and(|p| p.exists())
    }
}
