// Main entry point - Dependency injection and collector startup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use crate::application::collector::Collector;
use crate::application::measurement_store::MeasurementStore;
use crate::application::sample_buffer::SampleBuffer;
use crate::application::spike_detector::SpikeDetector;
use crate::application::stats::CollectorStats;
use crate::application::window_aggregator::WindowAggregator;
use crate::infrastructure::config::load_collector_config;
use crate::infrastructure::serial_reader::serial_lines;
use crate::infrastructure::supabase_repository::SupabaseRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::router::status_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration; missing store credentials stop us before any I/O
    let config = match load_collector_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Create store (infrastructure layer)
    let store: Arc<dyn MeasurementStore> = Arc::new(SupabaseRepository::new(
        config.store.url.clone(),
        config.store.service_role_key.clone(),
        config.store.timeout,
    )?);

    // Create collector state and services (application layer)
    let stats = Arc::new(CollectorStats::default());
    let buffer = Arc::new(SampleBuffer::new());
    let spikes = Arc::new(SpikeDetector::new(
        store.clone(),
        config.thresholds,
        config.spike_cooldown,
        config.site.clone(),
        stats.clone(),
    ));
    let window = Arc::new(WindowAggregator::new(
        store,
        config.thresholds,
        config.window_minutes,
        config.site.clone(),
        stats.clone(),
        Utc::now(),
    ));
    let collector = Collector::new(buffer, spikes, window, stats, config.schedule);

    tracing::info!(
        device_id = %config.site.device_id,
        room = %config.site.room,
        "Starting noise collector"
    );
    let handle = collector.start(serial_lines(config.serial.clone()));

    // Optional status server (presentation layer)
    if let Some(addr) = config.status_addr {
        let router = status_router(Arc::new(AppState {
            collector: collector.clone(),
        }));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Status server listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "Status server stopped");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    handle.shutdown().await;

    Ok(())
}
