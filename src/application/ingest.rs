// Ingest loop - decode lines into samples and queue them for the next drain
use crate::application::sample_buffer::SampleBuffer;
use crate::application::stats::CollectorStats;
use crate::domain::sample::RawSample;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::sync::Arc;

/// Consume lines until the source ends. Bad lines are logged and skipped.
pub async fn run_ingest<S>(lines: S, buffer: Arc<SampleBuffer>, stats: Arc<CollectorStats>)
where
    S: Stream<Item = String>,
{
    futures::pin_mut!(lines);
    while let Some(line) = lines.next().await {
        ingest_line(&line, &buffer, &stats, Utc::now());
    }
    tracing::warn!("Line source ended, no further samples will arrive");
}

/// Decode one line and buffer it. Returns whether a sample was accepted.
pub fn ingest_line(
    line: &str,
    buffer: &SampleBuffer,
    stats: &CollectorStats,
    received_at: DateTime<Utc>,
) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    stats.line_received();

    match RawSample::parse(line, received_at) {
        Ok(sample) => {
            stats.sample_accepted(sample.loud == Some(true));
            buffer.append(sample);
            true
        }
        Err(e) => {
            stats.line_rejected();
            tracing::warn!(line, error = %e, "Invalid JSON from sensor");
            false
        }
    }
}
