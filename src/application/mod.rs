// Application layer - Collector use cases over shared state
pub mod collector;
pub mod ingest;
pub mod measurement_store;
pub mod sample_buffer;
pub mod spike_detector;
pub mod stats;
pub mod window_aggregator;
