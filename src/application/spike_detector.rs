// Spike detector - instantaneous threshold alerts with cooldown
use crate::application::measurement_store::{MeasurementStore, StoreError};
use crate::application::stats::CollectorStats;
use crate::domain::report::{NewReport, Site};
use crate::domain::sample::RawSample;
use crate::domain::spike::SpikeCooldown;
use crate::domain::window::AlertThresholds;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A spike that holds the cooldown claim and still has to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeAlert {
    pub value: i64,
    pub detected_at: DateTime<Utc>,
    /// Later qualifying values of the same batch, tried in order if a write fails
    pub fallbacks: VecDeque<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Spike {
    value: i64,
    at: DateTime<Utc>,
}

struct SpikeState {
    cooldown: SpikeCooldown,
    /// Newest spike seen while a claim was in flight
    deferred: Option<Spike>,
}

pub struct SpikeDetector {
    store: Arc<dyn MeasurementStore>,
    state: Mutex<SpikeState>,
    thresholds: AlertThresholds,
    site: Site,
    stats: Arc<CollectorStats>,
}

impl SpikeDetector {
    pub fn new(
        store: Arc<dyn MeasurementStore>,
        thresholds: AlertThresholds,
        cooldown: Duration,
        site: Site,
        stats: Arc<CollectorStats>,
    ) -> Self {
        Self {
            store,
            state: Mutex::new(SpikeState {
                cooldown: SpikeCooldown::new(cooldown),
                deferred: None,
            }),
            thresholds,
            site,
            stats,
        }
    }

    /// Check a drained batch against the spike threshold.
    ///
    /// Every sample in a batch shares the tick's `now`, so one claim covers the
    /// batch: the first qualifying sample is written and the rest are kept as
    /// fallbacks. Spikes seen while another write is in flight are remembered
    /// and retried once that write settles.
    pub fn scan(&self, batch: &[RawSample], now: DateTime<Utc>) -> Option<SpikeAlert> {
        let mut spikes: VecDeque<i64> = batch
            .iter()
            .map(|s| s.value)
            .filter(|v| self.thresholds.is_spike(*v))
            .collect();
        let newest = *spikes.back()?;

        let mut state = self.lock();
        if !state.cooldown.try_claim(now) {
            if state.cooldown.is_in_flight() {
                state.deferred = Some(Spike { value: newest, at: now });
                tracing::debug!(raw = newest, "Spike deferred behind in-flight alert");
            } else {
                tracing::debug!(raw = newest, "Spike suppressed by cooldown");
            }
            return None;
        }

        let value = spikes.pop_front()?;
        Some(SpikeAlert {
            value,
            detected_at: now,
            fallbacks: spikes,
        })
    }

    /// Write the alert. Success starts the cooldown. Failure releases the claim
    /// and retries with the next qualifying sample, first from the same batch,
    /// then any spike deferred while the write was outstanding.
    ///
    /// Returns the outcome of the last write attempted.
    pub async fn persist(&self, alert: SpikeAlert) -> Result<(), StoreError> {
        let SpikeAlert {
            mut value,
            mut detected_at,
            mut fallbacks,
        } = alert;

        loop {
            let report = NewReport::spike(value, &self.site, detected_at);
            let result = self.store.insert_report(&report).await;

            match &result {
                Ok(()) => {
                    self.stats.spike_report_written();
                    tracing::info!(raw = value, "Spike report created");
                }
                Err(e) => {
                    self.stats.store_failed();
                    tracing::error!(raw = value, error = %e, "Failed to insert spike report");
                }
            }

            let mut state = self.lock();
            if result.is_ok() {
                state.cooldown.confirm();
                fallbacks.clear();
            } else {
                state.cooldown.release();
            }

            if let Some(next) = fallbacks.pop_front() {
                if state.cooldown.try_claim(detected_at) {
                    value = next;
                    continue;
                }
            }

            match state.deferred.take() {
                Some(spike) if state.cooldown.try_claim(spike.at) => {
                    value = spike.value;
                    detected_at = spike.at;
                    fallbacks.clear();
                }
                _ => return result,
            }
        }
    }

    pub fn last_spike_at(&self) -> Option<DateTime<Utc>> {
        self.lock().cooldown.last_spike_at()
    }

    fn lock(&self) -> MutexGuard<'_, SpikeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
