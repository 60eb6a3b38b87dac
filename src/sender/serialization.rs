use crate::buffer::Batch;
use crate::domain::Payload;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Batch is empty")]
    EmptyBatch,
}

/// Request body of the metrics API: every payload of a batch under `gauges`.
#[derive(Debug, Serialize)]
pub struct GaugeRequest<'a> {
    pub gauges: &'a [Payload],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSerializer;

impl BatchSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize_gauges(&self, batch: &Batch) -> Result<Bytes, SerializationError> {
        if batch.is_empty() {
            return Err(SerializationError::EmptyBatch);
        }
        let request = GaugeRequest {
            gauges: batch.payloads(),
        };
        Ok(Bytes::from(serde_json::to_vec(&request)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BatchType;
    use crate::domain::{Attributes, Credential};

    #[test]
    fn test_serialize_gauges_wire_shape() {
        let payload = Payload {
            name: "myapp.response_time.mean".to_string(),
            time: 1_700_000_060,
            value: "123.45600".to_string(),
            source: "web.1".to_string(),
            user: "u".to_string(),
            pass: "p".to_string(),
            attributes: Some(Attributes {
                display_min: 0,
                display_units_long: "ms".to_string(),
            }),
        };
        let batch = Batch::new(Credential::new("u", "p"), vec![payload], BatchType::TimeBased);

        let body = BatchSerializer::new().serialize_gauges(&batch).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"gauges":[{"name":"myapp.response_time.mean","measure_time":1700000060,"value":"123.45600","source":"web.1","attributes":{"display_min":0,"display_units_long":"ms"}}]}"#
        );
    }

    #[test]
    fn test_serialize_empty_batch_fails() {
        let batch = Batch::new(Credential::new("u", "p"), Vec::new(), BatchType::TimeBased);
        assert!(matches!(
            BatchSerializer::new().serialize_gauges(&batch),
            Err(SerializationError::EmptyBatch)
        ));
    }
}
