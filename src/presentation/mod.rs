// Presentation layer - Status HTTP surface
pub mod app_state;
pub mod handlers;
pub mod router;
