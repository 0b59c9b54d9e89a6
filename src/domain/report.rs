// Persisted record shapes shared with the dashboard
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::window::WindowSummary;

/// Store-assigned measurement key. The store may hand back a uuid string or a
/// bigint; both are kept as text and sent back as-is in `measurement_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MeasurementId(pub String);

impl<'de> Deserialize<'de> for MeasurementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => MeasurementId(s),
            Raw::Number(n) => MeasurementId(n.to_string()),
        })
    }
}

impl std::fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row for the `measurements` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMeasurement {
    pub device_id: String,
    pub avg_value: f64,
    pub min_value: i64,
    pub max_value: i64,
    pub room: String,
    pub created_at: DateTime<Utc>,
}

impl NewMeasurement {
    pub fn from_summary(summary: &WindowSummary, site: &Site) -> Self {
        Self {
            device_id: site.device_id.clone(),
            avg_value: summary.avg,
            min_value: summary.min,
            max_value: summary.max,
            room: site.room.clone(),
            created_at: summary.window_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Occupant complaint, created by the dashboard only
    #[allow(dead_code)]
    Manual,
    Auto,
}

/// Row for the `reports` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReport {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub text: String,
    pub location: String,
    pub room: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<MeasurementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Fixed placement of the sensor this collector reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub device_id: String,
    pub room: String,
    pub location: String,
}

impl NewReport {
    /// Auto report for a single sample at or above the spike threshold.
    pub fn spike(value: i64, site: &Site, now: DateTime<Utc>) -> Self {
        Self {
            report_type: ReportType::Auto,
            text: format!("Directe piek gedetecteerd in {} (raw={}).", site.room, value),
            location: site.location.clone(),
            room: site.room.clone(),
            date: now,
            measurement_id: None,
            user_id: None,
        }
    }

    /// Auto report for a loud window, linked to the measurement it summarizes.
    pub fn loud_window(
        summary: &WindowSummary,
        window_minutes: u64,
        measurement_id: MeasurementId,
        site: &Site,
        now: DateTime<Utc>,
    ) -> Self {
        let unit = if window_minutes == 1 { "minuut" } else { "minuten" };
        Self {
            report_type: ReportType::Auto,
            text: format!(
                "Luid geluid gedetecteerd in {} over {} {} (avg={:.1}, min={}, max={}).",
                site.room, window_minutes, unit, summary.avg, summary.min, summary.max
            ),
            location: site.location.clone(),
            room: site.room.clone(),
            date: now,
            measurement_id: Some(measurement_id),
            user_id: None,
        }
    }
}
