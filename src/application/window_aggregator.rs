// Window aggregator - sustained noise measurements and loud-window alerts
use crate::application::measurement_store::MeasurementStore;
use crate::application::stats::CollectorStats;
use crate::domain::report::{MeasurementId, NewMeasurement, NewReport, Site};
use crate::domain::sample::RawSample;
use crate::domain::window::{AggregationWindow, AlertThresholds, WindowSummary};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// What happened to one closed window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// Measurement stored; `reported` tells whether a loud-window report was too.
    Stored {
        measurement_id: MeasurementId,
        reported: bool,
    },
    /// Measurement stored but its loud-window report was rejected.
    ReportFailed { measurement_id: MeasurementId },
    /// Measurement rejected; the window's report was not attempted.
    MeasurementFailed,
}

pub struct WindowAggregator {
    store: Arc<dyn MeasurementStore>,
    window: Mutex<AggregationWindow>,
    thresholds: AlertThresholds,
    window_minutes: u64,
    site: Site,
    stats: Arc<CollectorStats>,
}

impl WindowAggregator {
    pub fn new(
        store: Arc<dyn MeasurementStore>,
        thresholds: AlertThresholds,
        window_minutes: u64,
        site: Site,
        stats: Arc<CollectorStats>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            window: Mutex::new(AggregationWindow::new(started_at)),
            thresholds,
            window_minutes,
            site,
            stats,
        }
    }

    pub fn fold(&self, batch: &[RawSample]) {
        if batch.is_empty() {
            return;
        }
        let mut window = self.lock();
        for sample in batch {
            window.fold(sample.value);
        }
    }

    /// Summarize and reset the live window. Returns `None` for an empty window.
    pub fn close(&self, now: DateTime<Utc>) -> Option<WindowSummary> {
        let summary = self.lock().close(now);
        self.stats.window_closed();
        summary
    }

    /// Store the measurement, then the loud-window report if a threshold is met.
    ///
    /// The report needs the measurement id, so a failed measurement drops the
    /// whole window without retry.
    pub async fn persist(&self, summary: WindowSummary) -> WindowOutcome {
        let measurement = NewMeasurement::from_summary(&summary, &self.site);

        let measurement_id = match self.store.insert_measurement(&measurement).await {
            Ok(id) => id,
            Err(e) => {
                self.stats.store_failed();
                tracing::error!(error = %e, avg = summary.avg, "Failed to insert measurement, dropping window");
                return WindowOutcome::MeasurementFailed;
            }
        };

        self.stats.measurement_written();
        tracing::info!(
            "Saved {}min measurement: avg={:.1}, min={}, max={}",
            self.window_minutes,
            summary.avg,
            summary.min,
            summary.max
        );

        if !self.thresholds.window_exceeded(&summary) {
            return WindowOutcome::Stored {
                measurement_id,
                reported: false,
            };
        }

        let report = NewReport::loud_window(
            &summary,
            self.window_minutes,
            measurement_id.clone(),
            &self.site,
            summary.window_end,
        );

        match self.store.insert_report(&report).await {
            Ok(()) => {
                self.stats.window_report_written();
                tracing::info!(measurement_id = %measurement_id, "Created auto report for loud window");
                WindowOutcome::Stored {
                    measurement_id,
                    reported: true,
                }
            }
            Err(e) => {
                self.stats.store_failed();
                tracing::error!(measurement_id = %measurement_id, error = %e, "Failed to insert window report");
                WindowOutcome::ReportFailed { measurement_id }
            }
        }
    }

    pub fn snapshot(&self) -> AggregationWindow {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, AggregationWindow> {
        self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
