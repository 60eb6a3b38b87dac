use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use prometheus::{Encoder, HistogramVec, IntGaugeVec, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use warp::{Filter, Reply};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[cfg(feature = "metrics")]
    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
    #[error("Metrics export failed: {0}")]
    ExportFailed(String),
}

/// Sink for the outlet's own measurements.
pub trait Measure: Send + Sync {
    /// Record an integer sample such as a queue depth.
    fn measure_i(&self, name: &str, units: &str, value: i64);

    /// Record the time elapsed since `start`.
    fn measure_t(&self, name: &str, start: Instant);
}

pub type SharedMeasure = Arc<dyn Measure>;

/// Writes measurements as log lines (`measure.outlet.inbox=3buckets`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMeasure;

impl Measure for LogMeasure {
    fn measure_i(&self, name: &str, units: &str, value: i64) {
        tracing::info!(target: "measure", "measure.{name}={value}{units}");
    }

    fn measure_t(&self, name: &str, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(target: "measure", "measure.{name}={elapsed_ms}ms");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Integer {
        name: String,
        units: String,
        value: i64,
    },
    Duration {
        name: String,
        elapsed: Duration,
    },
}

impl Sample {
    pub fn name(&self) -> &str {
        match self {
            Sample::Integer { name, .. } | Sample::Duration { name, .. } => name,
        }
    }
}

/// Keeps every sample in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMeasure {
    samples: Arc<Mutex<Vec<Sample>>>,
}

impl MemoryMeasure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.samples.lock().iter().filter(|s| s.name() == name).count()
    }

    pub fn integers(&self, name: &str) -> Vec<i64> {
        self.samples
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sample::Integer { name: n, value, .. } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }
}

impl Measure for MemoryMeasure {
    fn measure_i(&self, name: &str, units: &str, value: i64) {
        self.samples.lock().push(Sample::Integer {
            name: name.to_string(),
            units: units.to_string(),
            value,
        });
    }

    fn measure_t(&self, name: &str, start: Instant) {
        self.samples.lock().push(Sample::Duration {
            name: name.to_string(),
            elapsed: start.elapsed(),
        });
    }
}

/// Measurements as Prometheus gauges and histograms, labelled by name.
#[cfg(feature = "metrics")]
#[derive(Clone)]
pub struct PrometheusMeasure {
    registry: Arc<Registry>,
    values: IntGaugeVec,
    durations: HistogramVec,
}

#[cfg(feature = "metrics")]
impl PrometheusMeasure {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Arc::new(Registry::new());

        let values = IntGaugeVec::new(
            prometheus::Opts::new("rask_measure_value", "Latest integer measurement"),
            &["name", "units"],
        )?;
        registry.register(Box::new(values.clone()))?;

        let durations = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "rask_measure_duration_seconds",
                "Measured durations in seconds",
            ),
            &["name"],
        )?;
        registry.register(Box::new(durations.clone()))?;

        Ok(Self {
            registry,
            values,
            durations,
        })
    }

    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| MetricsError::ExportFailed(e.to_string()))
    }

    /// Serve `/metrics` until the process exits.
    pub async fn serve(self, port: u16) {
        let metrics = warp::path!("metrics")
            .and(warp::get())
            .map(move || match self.export_metrics() {
                Ok(text) => {
                    warp::reply::with_header(text, "content-type", "text/plain; version=0.0.4")
                        .into_response()
                }
                Err(e) => {
                    tracing::error!(at = "metrics-export-error", error = %e);
                    warp::reply::with_status(
                        "Internal Server Error",
                        warp::http::StatusCode::INTERNAL_SERVER_ERROR,
                    )
                    .into_response()
                }
            });

        tracing::info!("Starting Prometheus metrics server on port {}", port);
        warp::serve(metrics).run(([0, 0, 0, 0], port)).await;
    }
}

#[cfg(feature = "metrics")]
impl Measure for PrometheusMeasure {
    fn measure_i(&self, name: &str, units: &str, value: i64) {
        self.values.with_label_values(&[name, units]).set(value);
    }

    fn measure_t(&self, name: &str, start: Instant) {
        self.durations
            .with_label_values(&[name])
            .observe(start.elapsed().as_secs_f64());
    }
}

/// Sends every measurement to each of its sinks.
#[derive(Clone, Default)]
pub struct FanoutMeasure {
    sinks: Vec<SharedMeasure>,
}

impl FanoutMeasure {
    pub fn new(sinks: Vec<SharedMeasure>) -> Self {
        Self { sinks }
    }
}

impl Measure for FanoutMeasure {
    fn measure_i(&self, name: &str, units: &str, value: i64) {
        for sink in &self.sinks {
            sink.measure_i(name, units, value);
        }
    }

    fn measure_t(&self, name: &str, start: Instant) {
        for sink in &self.sinks {
            sink.measure_t(name, start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_measure_records_samples() {
        let measure = MemoryMeasure::new();
        measure.measure_i("outlet.inbox", "buckets", 3);
        measure.measure_i("outlet.inbox", "buckets", 5);
        measure.measure_t("outlet.post", Instant::now());

        assert_eq!(measure.integers("outlet.inbox"), vec![3, 5]);
        assert_eq!(measure.count("outlet.post"), 1);
        assert_eq!(measure.samples().len(), 3);
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = MemoryMeasure::new();
        let second = MemoryMeasure::new();
        let fanout = FanoutMeasure::new(vec![Arc::new(first.clone()), Arc::new(second.clone())]);

        fanout.measure_i("outlet.outbox", "requests", 1);
        assert_eq!(first.count("outlet.outbox"), 1);
        assert_eq!(second.count("outlet.outbox"), 1);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_measure_exports_samples() {
        let measure = PrometheusMeasure::new().unwrap();
        measure.measure_i("outlet.inbox", "buckets", 7);
        measure.measure_t("outlet.post", Instant::now());

        let text = measure.export_metrics().unwrap();
        assert!(text.contains(r#"rask_measure_value{name="outlet.inbox",units="buckets"} 7"#));
        assert!(text.contains("rask_measure_duration_seconds"));
    }
}
