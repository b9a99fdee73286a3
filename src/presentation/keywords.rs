// Keyword facade - Named operations for driving test frameworks
use crate::application::regression_service::RegressionService;
use crate::application::snapshot_store::SnapshotStore;
use crate::domain::dashboard::Panel;
use crate::domain::diff::Diff;
use crate::domain::query::TimeRange;
use crate::domain::record::ResultSet;
use crate::domain::snapshot::SnapshotComparator;
use crate::error::{RegressionError, Result};
use crate::infrastructure::config::RegressionConfig;
use crate::infrastructure::file_snapshot_store::FileSnapshotStore;
use crate::infrastructure::grafana_client::{Credentials, DEFAULT_TIMEOUT, GrafanaClient};
use crate::infrastructure::output::{log_json, save_to_file};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Every keyword that talks to Grafana fails with
/// [`RegressionError::NotConfigured`] until credentials are set.
pub struct RegressionKeywords {
    store: Arc<FileSnapshotStore>,
    comparator: SnapshotComparator,
    time_range: TimeRange,
    default_datasource: Option<String>,
    service: Option<RegressionService>,
}

impl RegressionKeywords {
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: Arc::new(FileSnapshotStore::new(snapshot_dir)),
            comparator: SnapshotComparator::default(),
            time_range: TimeRange::default(),
            default_datasource: None,
            service: None,
        }
    }

    /// Build a connected facade; missing credentials fail before any request.
    pub fn from_config(config: &RegressionConfig) -> Result<Self> {
        let grafana = config.grafana()?;
        let mut keywords = Self::offline(config);
        keywords.default_datasource = grafana.default_datasource_uid.clone();
        keywords.connect(&grafana.url, config.credentials()?, config.timeout())?;
        Ok(keywords)
    }

    /// Snapshot directory and comparison settings only; Grafana keywords
    /// fail with [`RegressionError::NotConfigured`] until credentials are set.
    pub fn offline(config: &RegressionConfig) -> Self {
        let mut keywords = Self::new(config.snapshots.dir.clone());
        keywords.comparator = config.comparator();
        keywords.time_range = config.time_range();
        keywords
    }

    pub fn snapshot_dir(&self) -> &Path {
        self.store.root()
    }

    pub fn set_grafana_credentials(&mut self, url: &str, token: &str) -> Result<()> {
        let credentials = Credentials::resolve(Some(token.to_string()), None, None)?;
        self.connect(url, credentials, DEFAULT_TIMEOUT)
    }

    pub fn set_grafana_basic_auth(&mut self, url: &str, username: &str, password: &str) -> Result<()> {
        let credentials =
            Credentials::resolve(None, Some(username.to_string()), Some(password.to_string()))?;
        self.connect(url, credentials, DEFAULT_TIMEOUT)
    }

    fn connect(&mut self, url: &str, credentials: Credentials, timeout: Duration) -> Result<()> {
        let client = GrafanaClient::new(url, credentials, timeout)?.with_time_range(self.time_range.clone());
        let service = RegressionService::new(Arc::new(client), self.store.clone())
            .with_comparator(self.comparator.clone())
            .with_default_datasource(self.default_datasource.clone());
        self.service = Some(service);
        Ok(())
    }

    fn service(&self) -> Result<&RegressionService> {
        self.service.as_ref().ok_or(RegressionError::NotConfigured)
    }

    // Grafana interaction

    pub fn fetch_panel_output(&self, dashboard_uid: &str, panel_id: i64) -> Result<Option<ResultSet>> {
        self.service()?.fetch_panel_output(dashboard_uid, panel_id)
    }

    pub fn get_panel_query(&self, dashboard_uid: &str, panel_id: i64) -> Result<Option<Vec<Value>>> {
        self.service()?.get_panel_query(dashboard_uid, panel_id)
    }

    pub fn get_dashboard_panels(&self, dashboard_uid: &str) -> Result<Vec<Panel>> {
        self.service()?.get_dashboard_panels(dashboard_uid)
    }

    pub fn normalize_panel_output(&self, output: &ResultSet) -> ResultSet {
        self.comparator.normalizer().normalize_set(output)
    }

    pub fn compare_panel_output_to_snapshot(
        &self,
        dashboard_uid: &str,
        panel_id: i64,
        dashboard_name: &str,
    ) -> Result<Diff> {
        self.service()?
            .compare_panel_output_to_snapshot(dashboard_uid, panel_id, dashboard_name)
    }

    pub fn assert_panel_output_matches_snapshot(
        &self,
        dashboard_uid: &str,
        panel_id: i64,
        dashboard_name: &str,
    ) -> Result<()> {
        self.service()?
            .assert_panel_output_matches_snapshot(dashboard_uid, panel_id, dashboard_name)
    }

    /// Fails once with every mismatching panel of the dashboard.
    pub fn compare_multiple_panels_to_snapshots(&self, dashboard_uid: &str, dashboard_name: &str) -> Result<()> {
        self.service()?
            .assert_dashboard_matches_snapshots(dashboard_uid, dashboard_name)
    }

    pub fn record_panel_snapshot(&self, dashboard_uid: &str, panel_id: i64, dashboard_name: &str) -> Result<bool> {
        let recorded = self
            .service()?
            .record_panel_snapshot(dashboard_uid, panel_id, dashboard_name)?;
        Ok(recorded.is_some())
    }

    pub fn record_dashboard_snapshots(&self, dashboard_uid: &str, dashboard_name: &str) -> Result<Vec<i64>> {
        self.service()?
            .record_dashboard_snapshots(dashboard_uid, dashboard_name)
    }

    // Utility & debugging

    pub fn log_panel_output(&self, dashboard_uid: &str, panel_id: i64) -> Result<()> {
        let output = self.fetch_panel_output(dashboard_uid, panel_id)?;
        log_json(&output)
    }

    pub fn save_panel_output_to_file(&self, dashboard_uid: &str, panel_id: i64, path: &Path) -> Result<()> {
        let output = self
            .fetch_panel_output(dashboard_uid, panel_id)?
            .unwrap_or_default();
        save_to_file(&output, path)
    }

    pub fn diff_panel_outputs(&self, dashboard_uid: &str, panel_id: i64, dashboard_name: &str) -> Result<Diff> {
        let diff = self.compare_panel_output_to_snapshot(dashboard_uid, panel_id, dashboard_name)?;
        log_json(&diff)?;
        Ok(diff)
    }

    pub fn print_snapshot_metadata(&self, dashboard_name: &str) -> Result<()> {
        match self.store.metadata(dashboard_name)? {
            Some(text) => print!("{}", text),
            None => println!("No metadata found."),
        }
        Ok(())
    }
}
