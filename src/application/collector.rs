// Collector scheduler - read loop plus two independent periodic ticks
use crate::application::ingest::run_ingest;
use crate::application::sample_buffer::SampleBuffer;
use crate::application::spike_detector::SpikeDetector;
use crate::application::stats::{CollectorStats, StatsSnapshot};
use crate::application::window_aggregator::{WindowAggregator, WindowOutcome};
use crate::domain::window::AggregationWindow;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Buffer drain and spike scan cadence
    pub drain_interval: Duration,
    /// Window close cadence
    pub window_interval: Duration,
}

/// Point-in-time view for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    pub stats: StatsSnapshot,
    pub buffered_samples: usize,
    pub window: AggregationWindow,
    pub last_spike_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct Collector {
    buffer: Arc<SampleBuffer>,
    spikes: Arc<SpikeDetector>,
    window: Arc<WindowAggregator>,
    stats: Arc<CollectorStats>,
    schedule: Schedule,
}

/// Running collector tasks. Dropping the handle leaves them running.
pub struct CollectorHandle {
    tasks: JoinSet<()>,
}

impl Collector {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        spikes: Arc<SpikeDetector>,
        window: Arc<WindowAggregator>,
        stats: Arc<CollectorStats>,
        schedule: Schedule,
    ) -> Self {
        Self {
            buffer,
            spikes,
            window,
            stats,
            schedule,
        }
    }

    /// Spawn the read loop and both timers.
    ///
    /// Ticks never await the store: writes go to detached tasks, so a slow
    /// store cannot push back either timer or the reader.
    pub fn start<S>(&self, lines: S) -> CollectorHandle
    where
        S: Stream<Item = String> + Send + 'static,
    {
        let mut tasks = JoinSet::new();

        tasks.spawn(run_ingest(lines, self.buffer.clone(), self.stats.clone()));

        let collector = self.clone();
        tasks.spawn(async move {
            let mut ticker = periodic(collector.schedule.drain_interval);
            loop {
                ticker.tick().await;
                collector.drain_tick(Utc::now());
            }
        });

        let collector = self.clone();
        tasks.spawn(async move {
            let mut ticker = periodic(collector.schedule.window_interval);
            loop {
                ticker.tick().await;
                collector.window_tick(Utc::now());
            }
        });

        tracing::info!(
            drain_ms = self.schedule.drain_interval.as_millis() as u64,
            window_ms = self.schedule.window_interval.as_millis() as u64,
            "Collector started"
        );

        CollectorHandle { tasks }
    }

    /// Drain the buffer, fold the batch into the window and scan it for spikes.
    /// Returns the batch size.
    pub fn drain_tick(&self, now: DateTime<Utc>) -> usize {
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return 0;
        }
        self.stats.drained();

        self.window.fold(&batch);

        if let Some(alert) = self.spikes.scan(&batch, now) {
            let spikes = self.spikes.clone();
            tokio::spawn(async move {
                // Logged and accounted inside persist
                let _ = spikes.persist(alert).await;
            });
        }

        tracing::debug!(samples = batch.len(), "Drained sample buffer");
        batch.len()
    }

    /// Close the live window and persist it in the background.
    pub fn window_tick(&self, now: DateTime<Utc>) {
        let Some(summary) = self.window.close(now) else {
            tracing::debug!("Window closed without samples");
            return;
        };

        let window = self.window.clone();
        tokio::spawn(async move {
            match window.persist(summary).await {
                WindowOutcome::Stored {
                    measurement_id,
                    reported,
                } => tracing::debug!(%measurement_id, reported, "Window persisted"),
                WindowOutcome::ReportFailed { measurement_id } => {
                    tracing::warn!(%measurement_id, "Loud-window alert lost, measurement kept")
                }
                WindowOutcome::MeasurementFailed => {}
            }
        });
    }

    pub fn status(&self) -> CollectorStatus {
        CollectorStatus {
            stats: self.stats.snapshot(),
            buffered_samples: self.buffer.len(),
            window: self.window.snapshot(),
            last_spike_at: self.spikes.last_spike_at(),
        }
    }
}

impl CollectorHandle {
    /// Stop the timers and the read loop. The line source is dropped with it.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        tracing::info!("Collector stopped");
    }
}

/// Interval whose first tick is one period out. Late ticks are skipped rather
/// than bunched, keeping later deadlines on their nominal grid.
fn periodic(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::measurement_store::memory::MemoryStore;
    use crate::application::measurement_store::{MeasurementStore, StoreError};
    use crate::domain::report::{MeasurementId, NewMeasurement, NewReport, Site};
    use crate::domain::window::AlertThresholds;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    /// Stores measurements normally but never completes a report write.
    #[derive(Default)]
    struct StuckReports {
        inner: MemoryStore,
    }

    #[async_trait]
    impl MeasurementStore for StuckReports {
        async fn insert_measurement(&self, m: &NewMeasurement) -> Result<MeasurementId, StoreError> {
            self.inner.insert_measurement(m).await
        }

        async fn insert_report(&self, _report: &NewReport) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    fn collector(store: Arc<dyn MeasurementStore>) -> (Collector, Arc<CollectorStats>) {
        let stats = Arc::new(CollectorStats::default());
        let site = Site {
            device_id: "arduino-uno-01".to_string(),
            room: "kamer 1".to_string(),
            location: "School".to_string(),
        };
        let spikes = Arc::new(SpikeDetector::new(
            store.clone(),
            AlertThresholds::default(),
            chrono::Duration::milliseconds(5000),
            site.clone(),
            stats.clone(),
        ));
        let window = Arc::new(WindowAggregator::new(
            store,
            AlertThresholds::default(),
            1,
            site,
            stats.clone(),
            Utc::now(),
        ));
        let collector = Collector::new(
            Arc::new(SampleBuffer::new()),
            spikes,
            window,
            stats.clone(),
            Schedule {
                drain_interval: Duration::from_secs(1),
                window_interval: Duration::from_secs(60),
            },
        );
        (collector, stats)
    }

    fn send(tx: &mpsc::UnboundedSender<String>, raw: i64) {
        tx.send(format!(r#"{{"raw":{}}}"#, raw)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_window_end_to_end() {
        let store = Arc::new(MemoryStore::default());
        let (collector, stats) = collector(store.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = collector.start(UnboundedReceiverStream::new(rx));

        for raw in [100, 200, 300] {
            send(&tx, raw);
        }
        tx.send("not json".to_string()).unwrap();

        tokio::time::sleep(Duration::from_millis(60_500)).await;

        let measurements = store.measurements();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].1.avg_value, 200.0);
        assert_eq!(measurements[0].1.min_value, 100);
        assert_eq!(measurements[0].1.max_value, 300);
        assert_eq!(store.report_attempts(), 0);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples_accepted, 3);
        assert_eq!(snapshot.lines_rejected, 1);
        assert_eq!(snapshot.drains, 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loud_samples_yield_spike_and_window_reports() {
        let store = Arc::new(MemoryStore::default());
        let (collector, _) = collector(store.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = collector.start(UnboundedReceiverStream::new(rx));

        send(&tx, 600);
        send(&tx, 600);
        tokio::time::sleep(Duration::from_millis(60_500)).await;

        let measurements = store.measurements();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].1.max_value, 600);

        let reports = store.reports();
        assert_eq!(reports.len(), 2);
        let linked: Vec<_> = reports
            .iter()
            .filter_map(|r| r.measurement_id.clone())
            .collect();
        assert_eq!(linked, vec![measurements[0].0.clone()]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_windows_write_nothing() {
        let store = Arc::new(MemoryStore::default());
        let (collector, stats) = collector(store.clone());
        let (_tx, rx) = mpsc::unbounded_channel::<String>();
        let handle = collector.start(UnboundedReceiverStream::new(rx));

        tokio::time::sleep(Duration::from_secs(185)).await;

        assert_eq!(stats.snapshot().windows_closed, 3);
        assert_eq!(store.measurement_attempts.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(store.report_attempts(), 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_store_write_does_not_stall_ticks() {
        let store = Arc::new(StuckReports::default());
        let (collector, stats) = collector(store.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = collector.start(UnboundedReceiverStream::new(rx));

        send(&tx, 900);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        send(&tx, 100);
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert_eq!(stats.snapshot().drains, 2);
        assert_eq!(collector.status().buffered_samples, 0);

        tokio::time::sleep(Duration::from_secs(58)).await;
        assert_eq!(store.inner.measurements().len(), 1);
        assert_eq!(stats.snapshot().windows_closed, 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_drain_tick_folds_into_window() {
        let store = Arc::new(MemoryStore::default());
        let (collector, _) = collector(store);
        let buffer = collector.buffer.clone();
        buffer.append(crate::domain::sample::RawSample::new(10, Utc::now()));
        buffer.append(crate::domain::sample::RawSample::new(30, Utc::now()));

        assert_eq!(collector.drain_tick(Utc::now()), 2);
        assert_eq!(collector.drain_tick(Utc::now()), 0);

        let status = collector.status();
        assert_eq!(status.window.count(), 2);
        assert_eq!(status.buffered_samples, 0);
    }
}
