//! Log query engine
//!
//! - **executor**: time range lookup, fetch, filter and sort
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use logstore::query::QueryEngine;
//! use logstore::storage::QueryRange;
//!
//! let output = engine.query(&QueryRange::new(60, 200).text("rror")).await?;
//! for entry in output.entries {
//!     println!("{} {}", entry.time, entry.message);
//! }
//! ```

mod error;
mod executor;

pub use error::{QueryError, QueryResult};
pub use executor::{QueryEngine, QueryOutput, QueryStats};
