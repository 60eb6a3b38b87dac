use crate::buffer::QueueMonitor;
use crate::reliability::{Measure, SharedMeasure};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Emit the depth of every stage queue each `interval` until cancelled.
pub async fn run_reporter(
    monitor: QueueMonitor,
    measure: SharedMeasure,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => report(&monitor, measure.as_ref()),
            () = shutdown.cancelled() => break,
        }
    }
    debug!(at = "reporter-stop");
}

fn report(monitor: &QueueMonitor, measure: &dyn Measure) {
    for (name, units, depth) in monitor.depths() {
        measure.measure_i(name, units, depth as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::StageQueues;
    use crate::reliability::MemoryMeasure;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_reports_every_queue_each_interval() {
        let queues = StageQueues::new(8);
        let measure = MemoryMeasure::new();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_reporter(
            QueueMonitor::new(&queues),
            Arc::new(measure.clone()),
            Duration::from_secs(2),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(4500)).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(measure.integers("outlet.inbox"), vec![0, 0]);
        assert_eq!(measure.integers("outlet.conversions"), vec![0, 0]);
        assert_eq!(measure.integers("outlet.outbox"), vec![0, 0]);
    }
}
