pub mod api;
pub mod audit_factory;
pub mod config;
pub mod error;
pub mod ingest;
pub mod providers;
pub mod telemetry;
