//! Core data types for the log store
//!
//! - `LogEntry`: a single timestamped log line
//! - `QueryRange`: an inclusive time interval plus optional text filter

use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};

/// A single log line
///
/// The timestamp is a unix time in whatever precision the producer uses;
/// the store only relies on its ordering. Serialized as `{"time": .., "log": ..}`,
/// which is both the HTTP wire shape and the stored blob body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp (producer-defined precision)
    pub time: i64,
    /// The log line itself
    #[serde(rename = "log")]
    pub message: String,
}

impl LogEntry {
    pub fn new(time: i64, message: impl Into<String>) -> Self {
        Self {
            time,
            message: message.into(),
        }
    }

    /// Encode as the stored blob body
    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored blob body
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Substring containment test; an empty needle always matches
    pub fn contains_text(&self, text: &str) -> bool {
        text.is_empty() || self.message.contains(text)
    }
}

/// Time range for queries, inclusive on both ends
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRange {
    pub start: i64,
    pub end: i64,
    /// Substring filter on the message (empty = no filter)
    pub text: String,
}

impl QueryRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            text: String::new(),
        }
    }

    /// Builder method: set the text filter
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, time: i64) -> bool {
        time >= self.start && time <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Whether an entry satisfies both the range and the text filter
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.contains(entry.time) && entry.contains_text(&self.text)
    }
}
