//! Conversation log writer.
//!
//! One growable JSONL file per conversation id. Appends are single complete
//! writes so concurrent callers never interleave partial records, and a
//! failed append never blocks message routing.

use crate::core::{now, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One appended record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was appended
    pub timestamp: Timestamp,
    /// Conversation this record belongs to
    pub conversation_id: String,
    /// Path trace at the time of logging
    pub path: String,
    /// Label of whoever produced the text
    pub source: String,
    /// The message text
    pub message: String,
}

/// Append-only conversation log, keyed by conversation id.
#[derive(Clone, Debug)]
pub struct ConversationLog {
    dir: PathBuf,
}

impl ConversationLog {
    /// Create a log rooted at `dir`. The directory is created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the records for `conversation_id`.
    pub fn file_for(&self, conversation_id: &str) -> PathBuf {
        self.dir
            .join(format!("conversation_{}.jsonl", conversation_id))
    }

    /// Append a record.
    ///
    /// Side effect only. I/O failure is logged and swallowed: a broken log
    /// sink must never abort message routing.
    pub fn append(&self, conversation_id: &str, path: &str, source: &str, message: &str) {
        let record = LogRecord {
            timestamp: now(),
            conversation_id: conversation_id.to_string(),
            path: path.to_string(),
            source: source.to_string(),
            message: message.to_string(),
        };
        if let Err(e) = self.try_append(&record) {
            warn!(
                conversation_id,
                error = %e,
                "failed to append conversation log record"
            );
        }
    }

    fn try_append(&self, record: &LogRecord) -> crate::core::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(&record.conversation_id))?;
        // One complete record per write call.
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read back every record for a conversation, oldest first.
    pub fn read(&self, conversation_id: &str) -> crate::core::Result<Vec<LogRecord>> {
        let file = self.file_for(conversation_id);
        if !Path::new(&file).exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(file)?;
        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}
