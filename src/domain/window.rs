// Window aggregation domain model
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Running sum/count/min/max over one wall-clock window.
///
/// `min`/`max` are `None` exactly when `count == 0`, and `sum` is then zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationWindow {
    sum: f64,
    count: u64,
    min: Option<i64>,
    max: Option<i64>,
    window_start: DateTime<Utc>,
}

/// Statistics of a closed, non-empty window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSummary {
    pub avg: f64,
    pub min: i64,
    pub max: i64,
    pub count: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl AggregationWindow {
    pub fn new(window_start: DateTime<Utc>) -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: None,
            max: None,
            window_start,
        }
    }

    pub fn fold(&mut self, value: i64) {
        self.sum += value as f64;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Summarize and reset in one step. An empty window only moves its start.
    pub fn close(&mut self, now: DateTime<Utc>) -> Option<WindowSummary> {
        let closed = std::mem::replace(self, Self::new(now));

        match (closed.min, closed.max) {
            (Some(min), Some(max)) if closed.count > 0 => Some(WindowSummary {
                avg: closed.sum / closed.count as f64,
                min,
                max,
                count: closed.count,
                window_start: closed.window_start,
                window_end: now,
            }),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[cfg(test)]
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }
}

/// Alert thresholds in sensor-native units. All comparisons are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub spike: i64,
    pub avg: f64,
    pub max: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            spike: 600,
            avg: 550.0,
            max: 600,
        }
    }
}

impl AlertThresholds {
    pub fn is_spike(&self, value: i64) -> bool {
        value >= self.spike
    }

    pub fn window_exceeded(&self, summary: &WindowSummary) -> bool {
        summary.avg >= self.avg || summary.max >= self.max
    }
}
