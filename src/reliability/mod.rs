pub mod measure;
pub mod retry;

#[cfg(feature = "metrics")]
pub use measure::PrometheusMeasure;
pub use measure::{
    FanoutMeasure, LogMeasure, Measure, MemoryMeasure, MetricsError, Sample, SharedMeasure,
};
pub use retry::{RetryPolicy, RetryStrategy};
