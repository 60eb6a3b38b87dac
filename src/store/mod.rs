//! Bucket storage feeding the outlet.
//!
//! [`MemoryStore`] aggregates measurements parsed from log lines into
//! per-identity buckets; a [`Reader`] moves finished buckets into the
//! outlet's inbox.

pub mod line;
pub mod memory;
pub mod reader;

pub use line::{bucket_from_line, window_start};
pub use memory::MemoryStore;
pub use reader::{Reader, StoreReader};

use crate::parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("No measurement found in log line")]
    NoMeasurement,

    #[error("Timestamp out of range: {0}")]
    InvalidTime(i64),
}
