use crate::domain::Credential;
use crate::store::{MemoryStore, StoreError, bucket_from_line};
use bytes::Bytes;
use chrono::Utc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

const LINE_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: u64,
    pub measurements: u64,
    pub skipped: u64,
}

/// Read log lines until EOF and record every measurement in `store`.
///
/// Lines are read as raw bytes. Lines without a measurement are skipped
/// quietly; undecodable ones are logged at debug and skipped.
pub async fn ingest_lines<R>(
    mut input: R,
    store: &MemoryStore,
    credential: &Credential,
    resolution: Duration,
) -> std::io::Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut buf = Vec::with_capacity(LINE_CAPACITY);

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        stats.lines += 1;
        let line = trim_line_ending(&buf);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match bucket_from_line(Bytes::copy_from_slice(line), credential, resolution, Utc::now()) {
            Ok((id, value)) => {
                store.put(id, value);
                stats.measurements += 1;
            }
            Err(StoreError::NoMeasurement) => stats.skipped += 1,
            Err(e) => {
                debug!(at = "line-skipped", line = stats.lines, error = %e);
                stats.skipped += 1;
            }
        }
    }
    Ok(stats)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_ingest_counts_lines() {
        let input: &[u8] = b"measure=db.latency val=12ms source=web.1\n\
            at=info msg=hello\n\
            \n\
            measure=db.latency val=\"13ms\n\
            measure=db.latency val=14ms source=web.1\n\
            measure.logins\n";
        let store = MemoryStore::new();
        let stats = ingest_lines(
            input,
            &store,
            &Credential::new("u", "p"),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert_eq!(stats.lines, 6);
        assert_eq!(stats.measurements, 3);
        assert_eq!(stats.skipped, 2);

        let buckets = store.drain_all();
        let names: BTreeSet<&str> = buckets.iter().map(|b| b.id.name.as_str()).collect();
        assert_eq!(names, BTreeSet::from(["db.latency", "logins"]));
        let latency: usize = buckets
            .iter()
            .filter(|b| b.id.name == "db.latency")
            .map(|b| b.count())
            .sum();
        assert_eq!(latency, 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let input: &[u8] = b"measure=a val=1\nmeasure=b val=\xff\xfe\r\nmeasure=c val=3";
        let store = MemoryStore::new();
        let stats = ingest_lines(
            input,
            &store,
            &Credential::new("u", "p"),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert_eq!(stats.lines, 3);
        assert_eq!(stats.measurements, 2);
        assert_eq!(stats.skipped, 1);

        let buckets = store.drain_all();
        let names: BTreeSet<&str> = buckets.iter().map(|b| b.id.name.as_str()).collect();
        assert_eq!(names, BTreeSet::from(["a", "c"]));
    }
}
