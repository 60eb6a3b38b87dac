pub mod batch;
pub mod queue;

pub use batch::{Batch, BatchConfig, BatchTable, BatchType};
pub use queue::{QueueMonitor, StageQueue, StageQueues};
