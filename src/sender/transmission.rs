use super::client::{ClientError, HttpClient};
use super::serialization::{BatchSerializer, SerializationError};
use crate::buffer::Batch;
use crate::domain::Credential;
use crate::reliability::{RetryPolicy, SharedMeasure};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] SerializationError),
    #[error("Client error: {0}")]
    ClientError(#[from] ClientError),
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("error=failed-request code={status} resp-body={body}")]
    FailedRequest { status: u16, body: String },
}

impl TransmissionError {
    /// Status code of a rejected request, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransmissionError::FailedRequest { status, .. } => Some(*status),
            TransmissionError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransmissionResult {
    pub batch_id: String,
    pub payloads: usize,
    pub bytes_sent: usize,
    pub attempts: u32,
    pub latency: Duration,
}

/// Posts gauge batches to the metrics API.
#[derive(Clone)]
pub struct BatchTransmitter {
    pub client: HttpClient,
    serializer: BatchSerializer,
    measure: SharedMeasure,
}

impl BatchTransmitter {
    pub fn new(client: HttpClient, measure: SharedMeasure) -> Self {
        Self {
            client,
            serializer: BatchSerializer::new(),
            measure,
        }
    }

    /// Serialize a batch once and post it under `policy`.
    pub async fn send_batch(
        &self,
        batch: &Batch,
        policy: &RetryPolicy,
    ) -> Result<TransmissionResult, TransmissionError> {
        let start = Instant::now();
        let body = self.serializer.serialize_gauges(batch)?;
        let bytes_sent = body.len();

        let attempts = self
            .post_with_retry(batch.credential(), body, policy)
            .await?;

        Ok(TransmissionResult {
            batch_id: batch.id().to_string(),
            payloads: batch.size(),
            bytes_sent,
            attempts,
            latency: start.elapsed(),
        })
    }

    /// Post `body` up to `policy.retries + 1` times and return the number of
    /// attempts it took. The last error is returned once retries run out.
    pub async fn post_with_retry(
        &self,
        credential: &Credential,
        body: Bytes,
        policy: &RetryPolicy,
    ) -> Result<u32, TransmissionError> {
        let mut attempt = 0;
        loop {
            match self.post(credential, body.clone()).await {
                Ok(()) => return Ok(attempt + 1),
                Err(e) => {
                    warn!(
                        at = "measure.outlet.error",
                        user = %credential.user,
                        attempt,
                        error = %e
                    );
                    if !policy.should_retry(attempt) {
                        return Err(e);
                    }
                    let delay = policy.delay();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// One timed POST. Only a 2xx answer counts as delivered.
    pub async fn post(&self, credential: &Credential, body: Bytes) -> Result<(), TransmissionError> {
        let start = Instant::now();
        let result = self.post_once(credential, body).await;
        self.measure.measure_t("outlet.post", start);
        result
    }

    async fn post_once(&self, credential: &Credential, body: Bytes) -> Result<(), TransmissionError> {
        let response = self
            .client
            .client
            .post(self.client.endpoint_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .basic_auth(&credential.user, Some(&credential.pass))
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status / 100 == 2 {
            debug!(at = "post-ok", status, user = %credential.user);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransmissionError::FailedRequest { status, body })
    }
}
