// Port for persisted snapshot baselines
use crate::domain::record::ResultSet;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Human-oriented description of a recorded dashboard baseline (`meta.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub dashboard_name: String,
    pub dashboard_uid: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub panels: Vec<i64>,
}

pub trait SnapshotStore: Send + Sync {
    /// Load the expected result set of one panel
    fn load(&self, dashboard_name: &str, panel_id: i64) -> Result<ResultSet>;

    /// Persist a result set as the new baseline of one panel
    fn save(&self, dashboard_name: &str, panel_id: i64, output: &ResultSet) -> Result<()>;

    /// Raw metadata text for a dashboard, if any was recorded
    fn metadata(&self, dashboard_name: &str) -> Result<Option<String>>;

    /// Record that the given panels were captured from `dashboard_uid` now
    fn record_metadata(&self, dashboard_name: &str, dashboard_uid: &str, panel_ids: &[i64]) -> Result<SnapshotMeta>;
}
