// Supabase (PostgREST) store implementation
use crate::application::measurement_store::{MeasurementStore, StoreError};
use crate::domain::report::{MeasurementId, NewMeasurement, NewReport};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MEASUREMENTS_TABLE: &str = "measurements";
const REPORTS_TABLE: &str = "reports";

#[derive(Debug, Clone)]
pub struct SupabaseRepository {
    client: reqwest::Client,
    base_url: String,
    service_role_key: String,
}

#[derive(Debug, Deserialize)]
struct InsertedRow {
    id: MeasurementId,
}

impl SupabaseRepository {
    pub fn new(base_url: String, service_role_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Supabase")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn insert<T: Serialize + Sync>(
        &self,
        table: &str,
        row: &T,
        prefer: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, StoreError> {
        let response = self
            .client
            .post(self.table_url(table))
            .query(query)
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", prefer)
            .json(row)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        Ok(response)
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(Box::new(e))
}

#[async_trait]
impl MeasurementStore for SupabaseRepository {
    async fn insert_measurement(&self, measurement: &NewMeasurement) -> Result<MeasurementId, StoreError> {
        let response = self
            .insert(
                MEASUREMENTS_TABLE,
                measurement,
                "return=representation",
                &[("select", "id")],
            )
            .await?;

        let rows: Vec<InsertedRow> = response.json().await.map_err(transport)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(StoreError::EmptyRepresentation(MEASUREMENTS_TABLE))?;

        tracing::debug!(measurement_id = %row.id, "Inserted measurement");
        Ok(row.id)
    }

    async fn insert_report(&self, report: &NewReport) -> Result<(), StoreError> {
        self.insert(REPORTS_TABLE, report, "return=minimal", &[]).await?;
        Ok(())
    }
}
