// Application layer - Ports and use cases
pub mod monitoring_api;
pub mod regression_service;
pub mod snapshot_store;
