//! Domain layer for rask-log-metrics.
//!
//! Contains the canonical types shared across all modules:
//! - `Bucket` / `BucketIdentity`: aggregated measurements for one metric window
//! - `Payload`: one gauge on its way to the metrics API
//! - `Credential`: the account a payload is delivered to
//! - `OutletError`: Top-level error type

pub mod bucket;
pub mod credential;
pub mod error;
pub mod payload;

pub use bucket::{Bucket, BucketIdentity};
pub use credential::Credential;
pub use error::OutletError;
pub use payload::{Attributes, Payload, format_count, format_value};
