// Store trait for persisting measurements and alert reports
use crate::domain::report::{MeasurementId, NewMeasurement, NewReport};
use async_trait::async_trait;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a usable response (connect, timeout, decode)
    #[error("store request failed: {0}")]
    Transport(#[source] BoxError),
    #[error("store rejected write with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("store returned no row for inserted {0}")]
    EmptyRepresentation(&'static str),
}

#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Insert a closed-window measurement and return its store-assigned id
    async fn insert_measurement(&self, measurement: &NewMeasurement) -> Result<MeasurementId, StoreError>;

    /// Insert an alert or complaint report
    async fn insert_report(&self, report: &NewReport) -> Result<(), StoreError>;
}

#[cfg(test)]
pub mod memory {
    //! In-memory store double with failure injection.
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct MemoryStore {
        pub measurements: Mutex<Vec<(MeasurementId, NewMeasurement)>>,
        pub reports: Mutex<Vec<NewReport>>,
        pub measurement_attempts: AtomicUsize,
        pub report_attempts: AtomicUsize,
        pub fail_measurements: AtomicBool,
        pub fail_reports: AtomicBool,
        /// Fail this many report writes before honouring `fail_reports`
        pub fail_next_reports: AtomicUsize,
    }

    impl MemoryStore {
        pub fn measurements(&self) -> Vec<(MeasurementId, NewMeasurement)> {
            self.measurements.lock().unwrap().clone()
        }

        pub fn reports(&self) -> Vec<NewReport> {
            self.reports.lock().unwrap().clone()
        }

        pub fn report_attempts(&self) -> usize {
            self.report_attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MeasurementStore for MemoryStore {
        async fn insert_measurement(&self, measurement: &NewMeasurement) -> Result<MeasurementId, StoreError> {
            let attempt = self.measurement_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_measurements.load(Ordering::SeqCst) {
                return Err(StoreError::Transport("measurements offline".into()));
            }
            let id = MeasurementId(format!("m-{}", attempt + 1));
            self.measurements
                .lock()
                .unwrap()
                .push((id.clone(), measurement.clone()));
            Ok(id)
        }

        async fn insert_report(&self, report: &NewReport) -> Result<(), StoreError> {
            self.report_attempts.fetch_add(1, Ordering::SeqCst);
            let forced = self
                .fail_next_reports
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if forced || self.fail_reports.load(Ordering::SeqCst) {
                return Err(StoreError::Transport("reports offline".into()));
            }
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }
    }
}
