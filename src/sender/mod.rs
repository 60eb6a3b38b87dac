pub mod client;
pub mod serialization;
pub mod transmission;

pub use client::{ClientConfig, ClientError, DEFAULT_ENDPOINT, HttpClient, USER_AGENT};
pub use serialization::{BatchSerializer, GaugeRequest, SerializationError};
pub use transmission::{BatchTransmitter, TransmissionError, TransmissionResult};
