// Application state for HTTP handlers
use crate::application::collector::Collector;

#[derive(Clone)]
pub struct AppState {
    pub collector: Collector,
}
