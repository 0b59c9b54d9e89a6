// Collector configuration - defaults, optional file, then environment
use crate::application::collector::Schedule;
use crate::domain::report::Site;
use crate::domain::window::AlertThresholds;
use anyhow::{bail, Context};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// One window per day is the coarsest the dashboard charts
const MAX_WINDOW_MINUTES: u64 = 24 * 60;
const MAX_SPIKE_COOLDOWN_MS: u64 = 24 * 60 * 60 * 1000;

/// Flat key space as it appears in the environment (`SERIAL_PORT` -> `serial_port`).
#[derive(Debug, Deserialize, Clone)]
struct CollectorSettings {
    serial_port: String,
    baud_rate: u32,
    serial_reconnect_ms: u64,
    device_id: String,
    room: String,
    location: String,
    threshold_spike: i64,
    threshold_avg: f64,
    threshold_max: i64,
    spike_cooldown_ms: u64,
    window_minutes: u64,
    sample_aggregation_interval_ms: u64,
    store_timeout_ms: u64,
    #[serde(default)]
    status_addr: Option<String>,
    #[serde(default)]
    supabase_url: Option<String>,
    #[serde(default)]
    supabase_service_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    /// Device path, or `-` for stdin
    pub port: String,
    pub baud_rate: u32,
    pub reconnect_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub url: String,
    pub service_role_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub serial: SerialConfig,
    pub site: Site,
    pub thresholds: AlertThresholds,
    pub spike_cooldown: chrono::Duration,
    pub window_minutes: u64,
    pub schedule: Schedule,
    pub store: StoreConfig,
    pub status_addr: Option<SocketAddr>,
}

/// Load `.env`, `config/collector.*` and the process environment.
///
/// Fails when the store endpoint or key is missing.
pub fn load_collector_config() -> anyhow::Result<CollectorConfig> {
    dotenv::dotenv().ok();
    build_config(
        Some("config/collector"),
        Environment::default().try_parsing(true),
    )
}

fn build_config(file: Option<&str>, env: Environment) -> anyhow::Result<CollectorConfig> {
    let mut builder = Config::builder()
        .set_default("serial_port", "/dev/ttyACM0")?
        .set_default("baud_rate", 9600)?
        .set_default("serial_reconnect_ms", 2000)?
        .set_default("device_id", "arduino-uno-01")?
        .set_default("room", "kamer 1")?
        .set_default("location", "School")?
        .set_default("threshold_spike", 600)?
        .set_default("threshold_avg", 550.0)?
        .set_default("threshold_max", 600)?
        .set_default("spike_cooldown_ms", 5000)?
        .set_default("window_minutes", 1)?
        .set_default("sample_aggregation_interval_ms", 1000)?
        .set_default("store_timeout_ms", 10_000)?;

    if let Some(name) = file {
        builder = builder.add_source(File::with_name(name).required(false));
    }

    let settings: CollectorSettings = builder
        .add_source(env)
        .build()?
        .try_deserialize()
        .context("Invalid collector configuration")?;

    settings.validate()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CollectorSettings {
    fn validate(self) -> anyhow::Result<CollectorConfig> {
        let (Some(url), Some(service_role_key)) = (
            non_empty(self.supabase_url),
            non_empty(self.supabase_service_role),
        ) else {
            bail!("Missing SUPABASE_URL or SUPABASE_SERVICE_ROLE");
        };

        let parsed = reqwest::Url::parse(&url).with_context(|| format!("Invalid SUPABASE_URL: {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("SUPABASE_URL must be http(s), got {}", parsed.scheme());
        }

        if self.baud_rate == 0 {
            bail!("BAUD_RATE must be positive");
        }
        if !(1..=MAX_WINDOW_MINUTES).contains(&self.window_minutes) {
            bail!(
                "WINDOW_MINUTES must be between 1 and {}, got {}",
                MAX_WINDOW_MINUTES,
                self.window_minutes
            );
        }
        if self.sample_aggregation_interval_ms == 0
            || self.sample_aggregation_interval_ms > self.window_minutes * 60_000
        {
            bail!(
                "SAMPLE_AGGREGATION_INTERVAL_MS must be between 1 and the window length, got {}",
                self.sample_aggregation_interval_ms
            );
        }

        if self.spike_cooldown_ms > MAX_SPIKE_COOLDOWN_MS {
            bail!(
                "SPIKE_COOLDOWN_MS must be at most {}, got {}",
                MAX_SPIKE_COOLDOWN_MS,
                self.spike_cooldown_ms
            );
        }
        let spike_cooldown = i64::try_from(self.spike_cooldown_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .with_context(|| format!("SPIKE_COOLDOWN_MS out of range: {}", self.spike_cooldown_ms))?;

        let status_addr = non_empty(self.status_addr)
            .map(|addr| addr.parse::<SocketAddr>().with_context(|| format!("Invalid STATUS_ADDR: {}", addr)))
            .transpose()?;

        Ok(CollectorConfig {
            serial: SerialConfig {
                port: self.serial_port,
                baud_rate: self.baud_rate,
                reconnect_delay: Duration::from_millis(self.serial_reconnect_ms),
            },
            site: Site {
                device_id: self.device_id,
                room: self.room,
                location: self.location,
            },
            thresholds: AlertThresholds {
                spike: self.threshold_spike,
                avg: self.threshold_avg,
                max: self.threshold_max,
            },
            spike_cooldown,
            window_minutes: self.window_minutes,
            schedule: Schedule {
                drain_interval: Duration::from_millis(self.sample_aggregation_interval_ms),
                window_interval: Duration::from_secs(self.window_minutes * 60),
            },
            store: StoreConfig {
                url,
                service_role_key,
                timeout: Duration::from_millis(self.store_timeout_ms),
            },
            status_addr,
        })
    }
}
