//! Index structures
//!
//! - **TimeIndex**: maps a time range to the storage keys inside it
//!
//! ```text
//! Query: [start, end]
//!        ↓
//! range_bounds → (after, before)   exclusive key bounds
//!        ↓
//! TimeIndex: cached BTreeSet range, or BlobStore::list_range
//!        ↓
//! candidate keys, ascending
//! ```

mod time_index;

pub use time_index::{CandidateSource, Candidates, IndexStats, TimeIndex};
