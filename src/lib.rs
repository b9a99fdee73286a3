//! Snapshot regression checks for Grafana dashboards.
//!
//! Panel queries are replayed against the Grafana HTTP API, the results are
//! normalized (volatile fields such as `timestamp` removed) and compared,
//! order-insensitively, with baselines recorded on disk.
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

pub use domain::diff::{Diff, DiffOptions};
pub use domain::query::{QueryRequest, build_queries};
pub use domain::record::{Normalizer, Record, ResultSet, normalize};
pub use domain::snapshot::{SnapshotComparator, compare_outputs};
pub use error::{RegressionError, Result};
pub use presentation::keywords::RegressionKeywords;
