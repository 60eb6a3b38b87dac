use super::batch::Batch;
use crate::domain::{Bucket, Payload};
use flume::{Receiver, Sender, WeakSender};

const INBOX: (&str, &str) = ("outlet.inbox", "buckets");
const CONVERSIONS: (&str, &str) = ("outlet.conversions", "payloads");
const OUTBOX: (&str, &str) = ("outlet.outbox", "requests");

/// A bounded multi-producer/multi-consumer FIFO between two stages.
///
/// Senders wait when the queue is full, which is how a slow stage pushes
/// back on the one feeding it.
#[derive(Debug)]
pub struct StageQueue<T> {
    name: &'static str,
    units: &'static str,
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for StageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            units: self.units,
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> StageQueue<T> {
    pub fn bounded(name: &'static str, units: &'static str, capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity.max(1));
        Self { name, units, tx, rx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn units(&self) -> &'static str {
        self.units
    }

    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<T> {
        self.rx.clone()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

/// The three queues between reader, converters, batcher and outlets.
#[derive(Debug, Clone)]
pub struct StageQueues {
    pub inbox: StageQueue<Bucket>,
    pub conversions: StageQueue<Payload>,
    pub outbox: StageQueue<Batch>,
}

impl StageQueues {
    pub fn new(capacity: usize) -> Self {
        Self {
            inbox: StageQueue::bounded(INBOX.0, INBOX.1, capacity),
            conversions: StageQueue::bounded(CONVERSIONS.0, CONVERSIONS.1, capacity),
            outbox: StageQueue::bounded(OUTBOX.0, OUTBOX.1, capacity),
        }
    }

    /// Current depth of every queue as `(name, units, depth)`.
    pub fn depths(&self) -> [(&'static str, &'static str, usize); 3] {
        [
            (self.inbox.name(), self.inbox.units(), self.inbox.len()),
            (
                self.conversions.name(),
                self.conversions.units(),
                self.conversions.len(),
            ),
            (self.outbox.name(), self.outbox.units(), self.outbox.len()),
        ]
    }
}

/// Read-only view of the queue depths.
///
/// Holds weak senders only, so it neither keeps a queue open nor counts as
/// a consumer. A closed queue reports a depth of zero.
#[derive(Debug, Clone)]
pub struct QueueMonitor {
    inbox: WeakSender<Bucket>,
    conversions: WeakSender<Payload>,
    outbox: WeakSender<Batch>,
}

impl QueueMonitor {
    pub fn new(queues: &StageQueues) -> Self {
        Self {
            inbox: queues.inbox.tx.downgrade(),
            conversions: queues.conversions.tx.downgrade(),
            outbox: queues.outbox.tx.downgrade(),
        }
    }

    /// Current depth of every queue as `(name, units, depth)`.
    pub fn depths(&self) -> [(&'static str, &'static str, usize); 3] {
        [
            (INBOX.0, INBOX.1, depth(&self.inbox)),
            (CONVERSIONS.0, CONVERSIONS.1, depth(&self.conversions)),
            (OUTBOX.0, OUTBOX.1, depth(&self.outbox)),
        ]
    }
}

fn depth<T>(queue: &WeakSender<T>) -> usize {
    queue.upgrade().map_or(0, |tx| tx.len())
}
