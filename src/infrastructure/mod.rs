// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod serial_reader;
pub mod supabase_repository;
