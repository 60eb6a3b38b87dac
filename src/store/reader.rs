use super::memory::MemoryStore;
use crate::domain::Bucket;
use chrono::Utc;
use flume::Sender;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Moves finished buckets into the outlet's inbox.
///
/// A reader may run at any pace; sending into a full inbox waits. Dropping
/// the inbox sender when the reader returns lets the pipeline drain.
pub trait Reader: Send + 'static {
    fn start(self, inbox: Sender<Bucket>) -> impl Future<Output = ()> + Send;
}

/// A fixed list of buckets, sent once in order.
impl Reader for Vec<Bucket> {
    async fn start(self, inbox: Sender<Bucket>) {
        for bucket in self {
            if inbox.send_async(bucket).await.is_err() {
                return;
            }
        }
    }
}

/// Polls a [`MemoryStore`] for buckets whose window has ended.
pub struct StoreReader {
    store: MemoryStore,
    interval: Duration,
    shutdown: CancellationToken,
}

impl StoreReader {
    pub fn new(store: MemoryStore, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            store,
            interval,
            shutdown,
        }
    }

    async fn push_all(inbox: &Sender<Bucket>, buckets: Vec<Bucket>) -> bool {
        for bucket in buckets {
            if inbox.send_async(bucket).await.is_err() {
                return false;
            }
        }
        true
    }
}

impl Reader for StoreReader {
    async fn start(self, inbox: Sender<Bucket>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let ready = self.store.drain_ready(Utc::now());
                    if !ready.is_empty() {
                        debug!(at = "reader-drain", buckets = ready.len());
                    }
                    if !Self::push_all(&inbox, ready).await {
                        info!(at = "reader-inbox-closed");
                        return;
                    }
                }
                () = self.shutdown.cancelled() => {
                    let remaining = self.store.drain_all();
                    info!(at = "reader-shutdown", buckets = remaining.len());
                    Self::push_all(&inbox, remaining).await;
                    return;
                }
            }
        }
    }
}
