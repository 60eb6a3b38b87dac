use super::StoreError;
use crate::domain::{BucketIdentity, Credential};
use crate::parser::decode;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

const MEASURE_PREFIX: &[u8] = b"measure.";

/// Start of the window of length `resolution` that contains `now`.
pub fn window_start(now: DateTime<Utc>, resolution: Duration) -> Result<DateTime<Utc>, StoreError> {
    let secs = now.timestamp();
    let step = resolution.as_secs().max(1) as i64;
    let start = secs - secs.rem_euclid(step);
    DateTime::from_timestamp(start, 0).ok_or(StoreError::InvalidTime(start))
}

/// Build the bucket identity and the measured value for one log line.
///
/// Two shapes are understood: `measure=<name> val=<value>` and the
/// shorthand `measure.<name>=<value>` (a bare `measure.<name>` counts 1).
/// The source is the dyno name of a runtime-metrics source when there is
/// one, otherwise `source` or `host`.
pub fn bucket_from_line(
    line: impl Into<Bytes>,
    credential: &Credential,
    resolution: Duration,
    now: DateTime<Utc>,
) -> Result<(BucketIdentity, f64), StoreError> {
    let tuples = decode(line)?;

    let metric = tuples.metric();
    let (name, value, units) = if metric.is_empty() {
        let tuple = tuples
            .iter()
            .find(|t| t.key().starts_with(MEASURE_PREFIX) && t.key().len() > MEASURE_PREFIX.len())
            .ok_or(StoreError::NoMeasurement)?;
        let name = String::from_utf8_lossy(&tuple.key()[MEASURE_PREFIX.len()..]).into_owned();
        (name, tuple.float64()?, tuple.units())
    } else {
        (metric, tuples.value()?, tuples.units())
    };

    let source = match tuples.metric_source() {
        dyno if !dyno.is_empty() => dyno,
        _ => tuples.source(),
    };

    let identity = BucketIdentity {
        name,
        source,
        user: credential.user.clone(),
        pass: credential.pass.clone(),
        time: window_start(now, resolution)?,
        resolution,
        units,
    };
    Ok((identity, value))
}
