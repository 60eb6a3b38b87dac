use crate::buffer::{Batch, BatchConfig, BatchTable, BatchType};
use crate::domain::Payload;
use flume::{Receiver, Sender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Groups payloads by credential and hands full or timed-out batches to the
/// outbox.
///
/// A batch leaves as soon as it holds `max_size` payloads. Every
/// `flush_interval` the whole table is flushed. When the conversions queue
/// closes, what is left is flushed and the task returns, which closes the
/// outbox.
pub async fn run_batcher(conversions: Receiver<Payload>, outbox: Sender<Batch>, config: BatchConfig) {
    let mut table = BatchTable::new(config.max_size);
    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    info!(
        "Starting batcher (capacity={}, flush_interval={:?})",
        config.max_size, config.flush_interval
    );

    loop {
        tokio::select! {
            received = conversions.recv_async() => {
                let Ok(payload) = received else {
                    let remaining = table.drain();
                    debug!(at = "batcher-final-flush", batches = remaining.len());
                    send_all(&outbox, remaining).await;
                    break;
                };
                if let Some(batch) = table.insert(payload)
                    && !send(&outbox, batch).await
                {
                    break;
                }
            }
            _ = ticker.tick() => {
                let ready = table.drain();
                if ready.is_empty() {
                    continue;
                }
                debug!(at = "batcher-flush", batches = ready.len());
                if !send_all(&outbox, ready).await {
                    break;
                }
            }
        }
    }
    info!("Batcher stopped");
}

async fn send(outbox: &Sender<Batch>, batch: Batch) -> bool {
    debug!(
        at = "batch-ready",
        batch_id = batch.id(),
        size = batch.size(),
        full = batch.batch_type() == BatchType::SizeBased
    );
    if outbox.send_async(batch).await.is_err() {
        info!(at = "batcher-stop", reason = "outbox-closed");
        return false;
    }
    true
}

async fn send_all(outbox: &Sender<Batch>, batches: Vec<Batch>) -> bool {
    for batch in batches {
        if !send(outbox, batch).await {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Credential;
    use std::time::Duration;
    use tokio::time::timeout;

    fn payload(user: &str, n: usize) -> Payload {
        Payload {
            name: format!("metric.{n}.mean"),
            time: 60,
            value: "1.00000".to_string(),
            source: String::new(),
            user: user.to_string(),
            pass: "p".to_string(),
            attributes: None,
        }
    }

    fn config(max_size: usize, flush_interval: Duration) -> BatchConfig {
        BatchConfig {
            max_size,
            flush_interval,
        }
    }

    #[tokio::test]
    async fn test_full_batch_leaves_before_the_timer() {
        let (conv_tx, conv_rx) = flume::bounded(512);
        let (out_tx, out_rx) = flume::bounded(4);
        tokio::spawn(run_batcher(conv_rx, out_tx, config(300, Duration::from_secs(3600))));

        for n in 0..300 {
            conv_tx.send_async(payload("u", n)).await.unwrap();
        }

        let batch = timeout(Duration::from_secs(1), out_rx.recv_async())
            .await
            .expect("full batch should be sent without waiting for a flush")
            .unwrap();
        assert_eq!(batch.size(), 300);
        assert_eq!(batch.batch_type(), BatchType::SizeBased);
        assert_eq!(batch.credential(), &Credential::new("u", "p"));
        assert_eq!(batch.payloads()[0].name, "metric.0.mean");
        assert_eq!(batch.payloads()[299].name, "metric.299.mean");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_flushes_each_credential_once() {
        let (conv_tx, conv_rx) = flume::bounded(16);
        let (out_tx, out_rx) = flume::bounded(16);
        tokio::spawn(run_batcher(conv_rx, out_tx, config(300, Duration::from_millis(200))));

        conv_tx.send_async(payload("a", 0)).await.unwrap();
        conv_tx.send_async(payload("b", 1)).await.unwrap();
        conv_tx.send_async(payload("a", 2)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        let mut batches: Vec<Batch> = out_rx.drain().collect();
        batches.sort_by(|l, r| l.credential().user.cmp(&r.credential().user));
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].size(), 2);
        assert_eq!(batches[1].size(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(out_rx.is_empty(), "an empty table flushes nothing");
    }

    #[tokio::test]
    async fn test_closing_conversions_flushes_and_closes_outbox() {
        let (conv_tx, conv_rx) = flume::bounded(16);
        let (out_tx, out_rx) = flume::bounded(16);
        let task = tokio::spawn(run_batcher(conv_rx, out_tx, config(300, Duration::from_secs(3600))));

        conv_tx.send_async(payload("u", 0)).await.unwrap();
        drop(conv_tx);
        task.await.unwrap();

        let batch = out_rx.recv_async().await.unwrap();
        assert_eq!(batch.size(), 1);
        assert!(out_rx.recv_async().await.is_err());
    }
}
