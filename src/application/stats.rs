// Runtime counters shared by the ingest loop, ticks and status endpoint
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CollectorStats {
    lines_received: AtomicU64,
    samples_accepted: AtomicU64,
    lines_rejected: AtomicU64,
    loud_samples: AtomicU64,
    drains: AtomicU64,
    windows_closed: AtomicU64,
    measurements_written: AtomicU64,
    spike_reports_written: AtomicU64,
    window_reports_written: AtomicU64,
    store_failures: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub lines_received: u64,
    pub samples_accepted: u64,
    pub lines_rejected: u64,
    pub loud_samples: u64,
    pub drains: u64,
    pub windows_closed: u64,
    pub measurements_written: u64,
    pub spike_reports_written: u64,
    pub window_reports_written: u64,
    pub store_failures: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl CollectorStats {
    pub fn line_received(&self) {
        bump(&self.lines_received);
    }

    pub fn sample_accepted(&self, loud: bool) {
        bump(&self.samples_accepted);
        if loud {
            bump(&self.loud_samples);
        }
    }

    pub fn line_rejected(&self) {
        bump(&self.lines_rejected);
    }

    pub fn drained(&self) {
        bump(&self.drains);
    }

    pub fn window_closed(&self) {
        bump(&self.windows_closed);
    }

    pub fn measurement_written(&self) {
        bump(&self.measurements_written);
    }

    pub fn spike_report_written(&self) {
        bump(&self.spike_reports_written);
    }

    pub fn window_report_written(&self) {
        bump(&self.window_reports_written);
    }

    pub fn store_failed(&self) {
        bump(&self.store_failures);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let read = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            lines_received: read(&self.lines_received),
            samples_accepted: read(&self.samples_accepted),
            lines_rejected: read(&self.lines_rejected),
            loud_samples: read(&self.loud_samples),
            drains: read(&self.drains),
            windows_closed: read(&self.windows_closed),
            measurements_written: read(&self.measurements_written),
            spike_reports_written: read(&self.spike_reports_written),
            window_reports_written: read(&self.window_reports_written),
            store_failures: read(&self.store_failures),
        }
    }
}
