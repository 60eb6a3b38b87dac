use crate::domain::{Credential, Payload};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BatchType {
    SizeBased,
    TimeBased,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_size: usize,
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: 300,
            flush_interval: Duration::from_millis(200),
        }
    }
}

/// Payloads for a single credential, flushed together in one request.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    credential: Credential,
    payloads: Vec<Payload>,
    batch_type: BatchType,
}

impl Batch {
    pub fn new(credential: Credential, payloads: Vec<Payload>, batch_type: BatchType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            credential,
            payloads,
            batch_type,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn size(&self) -> usize {
        self.payloads.len()
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    pub fn batch_type(&self) -> BatchType {
        self.batch_type
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// In-progress batches keyed by credential.
///
/// Owned by the batcher task alone; nothing else reads or writes it.
pub struct BatchTable {
    capacity: usize,
    pending: HashMap<Credential, Vec<Payload>>,
}

impl BatchTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of credentials with a pending batch.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Payloads pending for `credential`.
    pub fn pending_for(&self, credential: &Credential) -> usize {
        self.pending.get(credential).map_or(0, Vec::len)
    }

    /// Add a payload to its credential's batch. When that batch reaches
    /// capacity it is removed from the table and returned.
    pub fn insert(&mut self, payload: Payload) -> Option<Batch> {
        let credential = payload.credential();
        let capacity = self.capacity;
        let slot = self
            .pending
            .entry(credential.clone())
            .or_insert_with(|| Vec::with_capacity(capacity));
        slot.push(payload);

        if slot.len() < capacity {
            return None;
        }
        self.pending
            .remove_entry(&credential)
            .map(|(credential, payloads)| Batch::new(credential, payloads, BatchType::SizeBased))
    }

    /// Take every non-empty batch and clear the table.
    pub fn drain(&mut self) -> Vec<Batch> {
        self.pending
            .drain()
            .filter(|(_, payloads)| !payloads.is_empty())
            .map(|(credential, payloads)| Batch::new(credential, payloads, BatchType::TimeBased))
            .collect()
    }
}
