// Shared queue between the line reader and the drain tick
use crate::domain::sample::RawSample;
use std::sync::{Mutex, MutexGuard};

/// Accepted samples waiting for the next drain.
///
/// The lock is held only for a push or a swap, never across an await.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Mutex<Vec<RawSample>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, sample: RawSample) {
        self.lock().push(sample);
    }

    /// Take every buffered sample and leave the buffer empty.
    pub fn drain(&self) -> Vec<RawSample> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RawSample>> {
        // A panic mid-push cannot leave the Vec inconsistent
        self.samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
