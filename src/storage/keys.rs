//! Key scheme
//!
//! Maps (timestamp, batch, sequence) to a storage key that sorts
//! lexicographically in chronological order:
//!
//! ```text
//! 0000000001700000000/3f2a9c.../0000000000
//! └── time, 19 digits ┘└ batch ┘└ seq, 10 ┘
//! ```
//!
//! 19 digits hold every non-negative `i64`, so the time prefix never
//! truncates. Negative timestamps are rejected. The batch component makes
//! keys unique across concurrent ingestions; the sequence number orders
//! entries within a batch.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::LogEntry;

/// Digits used for the time component
pub const TIME_WIDTH: usize = 19;
/// Digits used for the sequence component
pub const SEQ_WIDTH: usize = 10;
/// Maximum length of a batch identifier
pub const MAX_BATCH_ID_LEN: usize = 64;

/// Identifier of one ingestion call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchId(String);

impl BatchId {
    /// Generate a fresh, globally unique batch ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate a caller-supplied batch ID
    ///
    /// Accepts 1-64 characters from `[A-Za-z0-9_-]`.
    pub fn parse(s: &str) -> StorageResult<Self> {
        if s.is_empty() || s.len() > MAX_BATCH_ID_LEN {
            return Err(StorageError::InvalidKey(format!(
                "batch id must be 1-{} characters, got {}",
                MAX_BATCH_ID_LEN,
                s.len()
            )));
        }

        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StorageError::InvalidKey(format!(
                "batch id '{}' may only contain letters, digits, '-' and '_'",
                s
            )));
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key produced by the key scheme
///
/// Equality, ordering and hashing are those of the encoded string, so a
/// sorted collection of keys is also sorted by `(time, batch, seq)`.
#[derive(Debug, Clone)]
pub struct StorageKey {
    raw: String,
    time: i64,
    seq: u32,
}

impl StorageKey {
    /// Encode a key
    pub fn new(time: i64, batch_id: &BatchId, seq: u32) -> StorageResult<Self> {
        if time < 0 {
            return Err(StorageError::InvalidKey(format!(
                "negative timestamp {} cannot be encoded",
                time
            )));
        }

        Ok(Self {
            raw: format!("{}/{}/{:0>width$}", encode_time(time), batch_id, seq, width = SEQ_WIDTH),
            time,
            seq,
        })
    }

    /// Decode a key listed from storage
    ///
    /// Anything the key scheme would not have produced is `InvalidKey`.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let invalid = || StorageError::InvalidKey(raw.to_string());

        let mut parts = raw.split('/');
        let (time_part, batch_part, seq_part) = match (parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(b), Some(s)) => (t, b, s),
            _ => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        if time_part.len() != TIME_WIDTH || !time_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if seq_part.len() != SEQ_WIDTH || !seq_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        BatchId::parse(batch_part).map_err(|_| invalid())?;

        let time: i64 = time_part.parse().map_err(|_| invalid())?;
        let seq: u32 = seq_part.parse().map_err(|_| invalid())?;

        Ok(Self {
            raw: raw.to_string(),
            time,
            seq,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Timestamp embedded in the key
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Sequence number within the batch
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Batch identifier embedded in the key
    pub fn batch_id(&self) -> &str {
        &self.raw[TIME_WIDTH + 1..self.raw.len() - SEQ_WIDTH - 1]
    }

    pub fn into_string(self) -> String {
        self.raw
    }
}

impl PartialEq for StorageKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for StorageKey {}

impl Hash for StorageKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for StorageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StorageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl Borrow<str> for StorageKey {
    fn borrow(&self) -> &str {
        &self.raw
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Zero-padded time component
pub fn encode_time(time: i64) -> String {
    format!("{:0>width$}", time, width = TIME_WIDTH)
}

/// Assign one key per entry
///
/// Entries are ordered by `(time, original index)` and numbered in that
/// order, so equal timestamps keep their input order. Keys are returned in
/// the *input* order so callers can correlate entry `i` with key `i`.
///
/// # Errors
///
/// `InvalidKey` if any entry has a negative timestamp or the batch is too
/// large for the sequence component.
pub fn assign_keys(batch_id: &BatchId, entries: &[LogEntry]) -> StorageResult<Vec<StorageKey>> {
    if let Some(entry) = entries.iter().find(|e| e.time < 0) {
        return Err(StorageError::InvalidKey(format!(
            "negative timestamp {} cannot be encoded",
            entry.time
        )));
    }

    let mut order: Vec<usize> = (0..entries.len()).collect();
    // sort_by_key is stable: ties keep their original index order
    order.sort_by_key(|&i| entries[i].time);

    let mut keys: Vec<Option<StorageKey>> = vec![None; entries.len()];
    for (seq, &idx) in order.iter().enumerate() {
        let seq = u32::try_from(seq).map_err(|_| {
            StorageError::InvalidKey(format!("batch of {} entries is too large", entries.len()))
        })?;
        keys[idx] = Some(StorageKey::new(entries[idx].time, batch_id, seq)?);
    }

    Ok(keys.into_iter().flatten().collect())
}

/// Exclusive listing bounds for keys with time in `[start, end]`
///
/// Every such key `k` satisfies `after < k < before` and no other key
/// does: `/` sorts below every digit, so `pad(end) + "0"` is above all keys
/// stamped `end` and below all keys stamped later. Returns `None` when no
/// key can match (empty range, or `end` negative).
pub fn range_bounds(start: i64, end: i64) -> Option<(String, String)> {
    if end < 0 || start > end {
        return None;
    }

    let after = encode_time(start.max(0));
    let before = format!("{}0", encode_time(end));
    Some((after, before))
}
