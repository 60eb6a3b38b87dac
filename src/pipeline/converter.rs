use crate::domain::{Attributes, Bucket, Payload, format_count, format_value};
use crate::reliability::SharedMeasure;
use chrono::Utc;
use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown reducer: {0}")]
pub struct UnknownReducer(pub String);

/// One summary statistic of a bucket. Each enabled reducer becomes a gauge
/// named `<metric>.<tag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reducer {
    Min,
    Max,
    Sum,
    Count,
    Mean,
    Last,
    Median,
    P95,
    P99,
}

impl Reducer {
    pub const ALL: [Reducer; 9] = [
        Reducer::Min,
        Reducer::Max,
        Reducer::Sum,
        Reducer::Count,
        Reducer::Mean,
        Reducer::Last,
        Reducer::Median,
        Reducer::P95,
        Reducer::P99,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Sum => "sum",
            Reducer::Count => "count",
            Reducer::Mean => "mean",
            Reducer::Last => "last",
            Reducer::Median => "median",
            Reducer::P95 => "perc95",
            Reducer::P99 => "perc99",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// The reduced value as it goes on the wire.
    pub fn render(self, bucket: &Bucket) -> String {
        match self {
            Reducer::Min => format_value(bucket.min()),
            Reducer::Max => format_value(bucket.max()),
            Reducer::Sum => format_value(bucket.sum()),
            Reducer::Count => format_count(bucket.count()),
            Reducer::Mean => format_value(bucket.mean()),
            Reducer::Last => format_value(bucket.last()),
            Reducer::Median => format_value(bucket.median()),
            Reducer::P95 => format_value(bucket.p95()),
            Reducer::P99 => format_value(bucket.p99()),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Reducer {
    type Err = UnknownReducer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(Reducer::Min),
            "max" => Ok(Reducer::Max),
            "sum" => Ok(Reducer::Sum),
            "count" => Ok(Reducer::Count),
            "mean" => Ok(Reducer::Mean),
            "last" => Ok(Reducer::Last),
            "median" => Ok(Reducer::Median),
            "perc95" | "p95" => Ok(Reducer::P95),
            "perc99" | "p99" => Ok(Reducer::P99),
            other => Err(UnknownReducer(other.to_string())),
        }
    }
}

impl TryFrom<String> for Reducer {
    type Error = UnknownReducer;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reducer> for String {
    fn from(reducer: Reducer) -> Self {
        reducer.tag().to_string()
    }
}

/// Which reducers the converters emit. Only the mean by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerSet {
    enabled: [bool; 9],
}

impl Default for ReducerSet {
    fn default() -> Self {
        Self::from_reducers([Reducer::Mean])
    }
}

impl ReducerSet {
    pub fn none() -> Self {
        Self {
            enabled: [false; 9],
        }
    }

    pub fn all() -> Self {
        Self { enabled: [true; 9] }
    }

    pub fn from_reducers(reducers: impl IntoIterator<Item = Reducer>) -> Self {
        let mut set = Self::none();
        for reducer in reducers {
            set.enable(reducer);
        }
        set
    }

    pub fn enable(&mut self, reducer: Reducer) {
        self.enabled[reducer.index()] = true;
    }

    pub fn is_enabled(&self, reducer: Reducer) -> bool {
        self.enabled[reducer.index()]
    }

    /// Enabled reducers in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Reducer> + '_ {
        Reducer::ALL.into_iter().filter(|r| self.is_enabled(*r))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromStr for ReducerSet {
    type Err = UnknownReducer;

    /// Comma separated tags, e.g. `mean,perc95,count`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reducers = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Reducer>, _>>()?;
        Ok(Self::from_reducers(reducers))
    }
}

/// Turn one bucket into its gauges. Empty buckets produce nothing.
pub fn convert(bucket: &Bucket, reducers: &ReducerSet) -> Vec<Payload> {
    if !bucket.has_values() {
        return Vec::new();
    }
    let id = &bucket.id;
    let time = id.end_time().timestamp();

    reducers
        .iter()
        .map(|reducer| Payload {
            name: format!("{}.{}", id.name, reducer.tag()),
            time,
            value: reducer.render(bucket),
            source: id.source.clone(),
            user: id.user.clone(),
            pass: id.pass.clone(),
            attributes: Some(Attributes {
                display_min: 0,
                display_units_long: id.units.clone(),
            }),
        })
        .collect()
}

/// One converter worker. Runs until the inbox is closed and drained.
pub async fn run_converter(
    worker: usize,
    inbox: Receiver<Bucket>,
    conversions: Sender<Payload>,
    reducers: ReducerSet,
    measure: SharedMeasure,
) {
    debug!(at = "converter-start", worker);
    while let Ok(bucket) = inbox.recv_async().await {
        if !bucket.has_values() {
            info!(at = "bucket-no-vals", bucket = %bucket.id.name);
            continue;
        }

        for payload in convert(&bucket, &reducers) {
            if conversions.send_async(payload).await.is_err() {
                debug!(at = "converter-stop", worker, reason = "conversions-closed");
                return;
            }
        }
        measure.measure_i("bucket.conversion.delay", "s", bucket.id.delay(Utc::now()));
    }
    debug!(at = "converter-stop", worker, reason = "inbox-closed");
}
