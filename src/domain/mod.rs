// Domain layer - Pure data model and comparison logic
pub mod dashboard;
pub mod diff;
pub mod query;
pub mod record;
pub mod snapshot;
