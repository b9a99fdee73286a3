// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_snapshot_store;
pub mod frames;
pub mod grafana_client;
pub mod output;
