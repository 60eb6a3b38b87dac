use crate::buffer::Batch;
use crate::reliability::RetryPolicy;
use crate::sender::{BatchTransmitter, TransmissionError};
use flume::Receiver;
use tracing::{debug, error};

/// One outlet worker: posts every batch from the outbox until it is closed
/// and drained. A failed batch is logged and dropped.
pub async fn run_outlet(
    worker: usize,
    outbox: Receiver<Batch>,
    transmitter: BatchTransmitter,
    policy: RetryPolicy,
) {
    debug!(at = "outlet-start", worker);
    while let Ok(batch) = outbox.recv_async().await {
        deliver(&transmitter, &batch, &policy).await;
    }
    debug!(at = "outlet-stop", worker);
}

async fn deliver(transmitter: &BatchTransmitter, batch: &Batch, policy: &RetryPolicy) {
    if batch.is_empty() {
        error!(at = "empty-metrics-error", batch_id = batch.id());
        return;
    }

    match transmitter.send_batch(batch, policy).await {
        Ok(result) => debug!(
            at = "batch-delivered",
            batch_id = %result.batch_id,
            payloads = result.payloads,
            bytes = result.bytes_sent,
            attempts = result.attempts,
            latency_ms = result.latency.as_millis() as u64
        ),
        Err(TransmissionError::SerializationFailed(e)) => {
            error!(at = "json-error", batch_id = batch.id(), error = %e);
        }
        Err(e) => error!(
            at = "delivery-failed",
            batch_id = batch.id(),
            user = %batch.credential().user,
            payloads = batch.size(),
            attempts = policy.max_attempts(),
            error = %e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BatchType;
    use crate::domain::{Credential, Payload};
    use crate::reliability::MemoryMeasure;
    use crate::sender::{ClientConfig, HttpClient};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transmitter(endpoint: String) -> BatchTransmitter {
        let client = HttpClient::new(ClientConfig {
            endpoint,
            ..Default::default()
        })
        .unwrap();
        BatchTransmitter::new(client, Arc::new(MemoryMeasure::new()))
    }

    fn batch(payloads: usize) -> Batch {
        let payloads = (0..payloads)
            .map(|n| Payload {
                name: format!("m{n}.mean"),
                time: 60,
                value: "1.00000".to_string(),
                source: String::new(),
                user: "u".to_string(),
                pass: "p".to_string(),
                attributes: None,
            })
            .collect();
        Batch::new(Credential::new("u", "p"), payloads, BatchType::TimeBased)
    }

    #[tokio::test]
    async fn test_empty_batch_is_never_posted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (tx, rx) = flume::bounded(2);
        tx.send_async(batch(0)).await.unwrap();
        drop(tx);
        run_outlet(0, rx, transmitter(server.uri()), RetryPolicy::immediate(2)).await;
    }

    #[tokio::test]
    async fn test_worker_keeps_going_after_a_failed_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/metrics"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/metrics"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (tx, rx) = flume::bounded(2);
        tx.send_async(batch(1)).await.unwrap();
        tx.send_async(batch(2)).await.unwrap();
        drop(tx);
        run_outlet(
            0,
            rx,
            transmitter(format!("{}/v1/metrics", server.uri())),
            RetryPolicy::immediate(0),
        )
        .await;
    }
}
