//! The outlet pipeline: reader → converters → batcher → outlets.
//!
//! Stages are connected by bounded queues of the same capacity, so a slow
//! outlet backs up through the batcher and converters to the reader. A
//! separate reporter samples the queue depths.

pub mod batcher;
pub mod converter;
pub mod outlet;
pub mod reporter;

pub use batcher::run_batcher;
pub use converter::{Reducer, ReducerSet, UnknownReducer, convert, run_converter};
pub use outlet::run_outlet;
pub use reporter::run_reporter;

use crate::buffer::{BatchConfig, QueueMonitor, StageQueues};
use crate::domain::OutletError;
use crate::reliability::{RetryPolicy, SharedMeasure};
use crate::sender::{BatchTransmitter, ClientConfig, HttpClient, TransmissionError};
use crate::store::Reader;
use futures::future::join_all;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct OutletConfig {
    pub converters: usize,
    pub outlets: usize,
    /// Capacity of each stage queue.
    pub buffer_size: usize,
    pub batch: BatchConfig,
    pub retry: RetryPolicy,
    pub client: ClientConfig,
    pub reducers: ReducerSet,
    pub report_interval: Duration,
}

impl Default for OutletConfig {
    fn default() -> Self {
        Self {
            converters: 4,
            outlets: 4,
            buffer_size: 1024,
            batch: BatchConfig::default(),
            retry: RetryPolicy::default(),
            client: ClientConfig::default(),
            reducers: ReducerSet::default(),
            report_interval: Duration::from_secs(2),
        }
    }
}

/// Delivers buckets to the metrics API.
pub struct MetricsOutlet {
    config: OutletConfig,
    transmitter: BatchTransmitter,
    measure: SharedMeasure,
}

impl MetricsOutlet {
    pub fn new(config: OutletConfig, measure: SharedMeasure) -> Result<Self, OutletError> {
        let client = HttpClient::new(config.client.clone()).map_err(TransmissionError::from)?;
        let transmitter = BatchTransmitter::new(client, measure.clone());
        Ok(Self {
            config,
            transmitter,
            measure,
        })
    }

    pub fn config(&self) -> &OutletConfig {
        &self.config
    }

    /// Spawn the reader, every worker and the reporter.
    ///
    /// The stages stop in order once the reader returns: the inbox closes,
    /// converters finish, the batcher flushes what is left and the outlets
    /// drain the outbox.
    pub fn start<R: Reader>(&self, reader: R) -> OutletHandle {
        let config = &self.config;
        let queues = StageQueues::new(config.buffer_size);
        let monitor = QueueMonitor::new(&queues);
        let shutdown = CancellationToken::new();

        info!(
            converters = config.converters,
            outlets = config.outlets,
            buffer_size = config.buffer_size,
            endpoint = %config.client.endpoint,
            "Starting metrics outlet"
        );

        let mut stages = Vec::with_capacity(2 + config.converters + config.outlets);
        stages.push(tokio::spawn(reader.start(queues.inbox.sender())));

        for worker in 0..config.converters {
            stages.push(tokio::spawn(run_converter(
                worker,
                queues.inbox.receiver(),
                queues.conversions.sender(),
                config.reducers,
                self.measure.clone(),
            )));
        }

        stages.push(tokio::spawn(run_batcher(
            queues.conversions.receiver(),
            queues.outbox.sender(),
            config.batch.clone(),
        )));

        for worker in 0..config.outlets {
            stages.push(tokio::spawn(run_outlet(
                worker,
                queues.outbox.receiver(),
                self.transmitter.clone(),
                config.retry.clone(),
            )));
        }

        let reporter = tokio::spawn(run_reporter(
            monitor.clone(),
            self.measure.clone(),
            config.report_interval,
            shutdown.clone(),
        ));

        // Only the spawned stages may hold senders from here on.
        drop(queues);

        OutletHandle {
            stages,
            reporter,
            shutdown,
            monitor,
        }
    }
}

/// Running pipeline tasks.
pub struct OutletHandle {
    stages: Vec<JoinHandle<()>>,
    reporter: JoinHandle<()>,
    shutdown: CancellationToken,
    monitor: QueueMonitor,
}

impl OutletHandle {
    pub fn monitor(&self) -> &QueueMonitor {
        &self.monitor
    }

    /// Wait for every stage to finish, then stop the reporter.
    pub async fn wait(self) {
        for result in join_all(self.stages).await {
            if let Err(e) = result {
                warn!(at = "stage-panicked", error = %e);
            }
        }
        self.shutdown.cancel();
        if let Err(e) = self.reporter.await {
            warn!(at = "reporter-panicked", error = %e);
        }
        info!("Metrics outlet stopped");
    }

    /// Stop the reporter and abort every stage without draining.
    pub fn abort(self) {
        self.shutdown.cancel();
        for stage in &self.stages {
            stage.abort();
        }
    }
}
