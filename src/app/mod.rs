pub mod config;
pub mod ingest;
pub mod logging_system;

pub use config::{Config, ConfigError, LogFormat, LogLevel};
pub use ingest::{IngestStats, ingest_lines};
pub use logging_system::{build_filter_string, setup_logging};

use crate::domain::{Credential, OutletError};
use crate::pipeline::MetricsOutlet;
use crate::reliability::{LogMeasure, SharedMeasure};
use crate::store::{MemoryStore, StoreReader};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Longest pause between two scans of the store for finished buckets.
const MAX_STORE_POLL: Duration = Duration::from_secs(1);

/// The binary: reads log lines, aggregates them into buckets and runs the
/// outlet pipeline.
pub struct App {
    config: Config,
    credential: Credential,
    measure: SharedMeasure,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, OutletError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::load(args)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, OutletError> {
        let credential = config.credential()?;
        let measure = Self::build_measure(&config)?;

        info!("Starting rask-log-metrics v{}", crate::VERSION);
        info!(
            endpoint = %config.endpoint,
            user = %credential.user,
            converters = config.converters,
            outlets = config.outlets,
            buffer_size = config.buffer_size,
            batch_capacity = config.batch_capacity,
            reducers = %config.reducers,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            credential,
            measure,
        })
    }

    /// Same as [`App::from_config`] with measurements sent to `measure`.
    pub fn with_measure(config: Config, measure: SharedMeasure) -> Result<Self, OutletError> {
        let credential = config.credential()?;
        Ok(Self {
            config,
            credential,
            measure,
        })
    }

    #[cfg(feature = "metrics")]
    fn build_measure(config: &Config) -> Result<SharedMeasure, OutletError> {
        use crate::reliability::{FanoutMeasure, PrometheusMeasure};

        if !config.enable_metrics {
            return Ok(Arc::new(LogMeasure));
        }
        let prometheus = PrometheusMeasure::new()?;
        tokio::spawn(prometheus.clone().serve(config.metrics_port));
        Ok(Arc::new(FanoutMeasure::new(vec![
            Arc::new(LogMeasure),
            Arc::new(prometheus),
        ])))
    }

    #[cfg(not(feature = "metrics"))]
    fn build_measure(_config: &Config) -> Result<SharedMeasure, OutletError> {
        Ok(Arc::new(LogMeasure))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(self) -> Result<IngestStats, OutletError> {
        self.run_with_input(BufReader::new(tokio::io::stdin())).await
    }

    /// Ingest `input` until EOF or ctrl-c, then drain the store and wait for
    /// the pipeline to deliver what is left.
    pub async fn run_with_input<R>(self, input: R) -> Result<IngestStats, OutletError>
    where
        R: AsyncBufRead + Unpin,
    {
        let store = MemoryStore::new();
        let shutdown = CancellationToken::new();
        let poll = self.config.resolution().min(MAX_STORE_POLL);

        let outlet = MetricsOutlet::new(self.config.outlet_config(), self.measure.clone())?;
        let reader = StoreReader::new(store.clone(), poll, shutdown.clone());
        let handle = outlet.start(reader);

        let ingest = ingest_lines(input, &store, &self.credential, self.config.resolution());
        let result = tokio::select! {
            result = ingest => result,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(at = "signal-error", error = %e);
                }
                info!("Received shutdown signal");
                Ok(IngestStats::default())
            }
        };

        info!(at = "draining", pending_buckets = store.len());
        shutdown.cancel();
        handle.wait().await;

        let stats = result?;
        info!(
            lines = stats.lines,
            measurements = stats.measurements,
            skipped = stats.skipped,
            "rask-log-metrics stopped"
        );
        Ok(stats)
    }
}

/// Main entry point for the binary.
pub async fn main() -> anyhow::Result<()> {
    let config = Config::load(std::env::args_os())?;
    setup_logging(config.log_level, config.log_format)?;

    let app = App::from_config(config)?;
    app.run().await?;
    Ok(())
}
