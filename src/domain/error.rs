use crate::app::ConfigError;
use crate::parser::ParseError;
use crate::reliability::MetricsError;
use crate::sender::TransmissionError;
use crate::store::StoreError;
use thiserror::Error;

/// Top-level error type for the metrics outlet.
#[derive(Error, Debug)]
pub enum OutletError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transmission error: {0}")]
    Transmission(#[from] TransmissionError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
