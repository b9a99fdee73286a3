// Regression service - Compare panel output against recorded snapshots
use crate::application::monitoring_api::MonitoringApi;
use crate::application::snapshot_store::SnapshotStore;
use crate::domain::dashboard::{Panel, dashboard_panels, find_panel};
use crate::domain::diff::Diff;
use crate::domain::record::ResultSet;
use crate::domain::snapshot::SnapshotComparator;
use crate::error::{DashboardMismatches, MismatchReport, PanelMismatch, RegressionError, Result};
use crate::infrastructure::frames::result_set_from_response;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct RegressionService {
    api: Arc<dyn MonitoringApi>,
    store: Arc<dyn SnapshotStore>,
    comparator: SnapshotComparator,
    default_datasource: Option<String>,
}

impl RegressionService {
    pub fn new(api: Arc<dyn MonitoringApi>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            api,
            store,
            comparator: SnapshotComparator::default(),
            default_datasource: None,
        }
    }

    pub fn with_comparator(mut self, comparator: SnapshotComparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_default_datasource(mut self, uid: Option<String>) -> Self {
        self.default_datasource = uid;
        self
    }

    pub fn api(&self) -> &dyn MonitoringApi {
        self.api.as_ref()
    }

    pub fn comparator(&self) -> &SnapshotComparator {
        &self.comparator
    }

    pub fn get_dashboard_panels(&self, dashboard_uid: &str) -> Result<Vec<Panel>> {
        self.api.get_dashboard_panels(dashboard_uid)
    }

    pub fn get_panel_query(&self, dashboard_uid: &str, panel_id: i64) -> Result<Option<Vec<Value>>> {
        let dashboard = self.api.get_dashboard(dashboard_uid)?;
        Ok(self.api.get_panel_query(&dashboard, panel_id))
    }

    /// Current output of one panel, `None` when the dashboard has no such panel.
    pub fn fetch_panel_output(&self, dashboard_uid: &str, panel_id: i64) -> Result<Option<ResultSet>> {
        let dashboard = self.api.get_dashboard(dashboard_uid)?;
        match find_panel(&dashboard, panel_id) {
            Some(panel) => self.query_output(&panel).map(Some),
            None => {
                tracing::warn!("Panel {} not found in dashboard {}", panel_id, dashboard_uid);
                Ok(None)
            }
        }
    }

    pub fn normalize(&self, output: &ResultSet) -> ResultSet {
        self.comparator.normalizer().normalize_set(output)
    }

    pub fn compare_panel_output_to_snapshot(
        &self,
        dashboard_uid: &str,
        panel_id: i64,
        dashboard_name: &str,
    ) -> Result<Diff> {
        let current = self
            .fetch_panel_output(dashboard_uid, panel_id)?
            .unwrap_or_else(|| {
                tracing::warn!("Comparing missing panel {} as empty output", panel_id);
                ResultSet::default()
            });
        let expected = self.store.load(dashboard_name, panel_id)?;
        Ok(self.comparator.compare(&current, &expected))
    }

    pub fn assert_panel_output_matches_snapshot(
        &self,
        dashboard_uid: &str,
        panel_id: i64,
        dashboard_name: &str,
    ) -> Result<()> {
        let diff = self.compare_panel_output_to_snapshot(dashboard_uid, panel_id, dashboard_name)?;
        if diff.is_empty() {
            tracing::info!("Panel {} matches snapshot {}", panel_id, dashboard_name);
            return Ok(());
        }
        Err(RegressionError::Mismatch(MismatchReport::Panel(PanelMismatch {
            panel_id,
            diff,
        })))
    }

    /// Compare every non-row panel of a dashboard and return all panels that
    /// drifted. A panel without a recorded baseline is listed in
    /// `missing_snapshots` and does not stop the run; transport, storage and
    /// input errors do.
    pub fn collect_dashboard_mismatches(
        &self,
        dashboard_uid: &str,
        dashboard_name: &str,
    ) -> Result<DashboardMismatches> {
        let dashboard = self.api.get_dashboard(dashboard_uid)?;
        let panels = dashboard_panels(&dashboard);

        let mut report = DashboardMismatches::default();
        for panel in panels.iter().filter(|p| !p.is_row()) {
            let expected = match self.store.load(dashboard_name, panel.id) {
                Ok(expected) => expected,
                Err(RegressionError::SnapshotNotFound { path }) => {
                    tracing::warn!("Panel {} has no snapshot at {}", panel.id, path.display());
                    report.missing_snapshots.push(panel.id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let current = self.query_output(panel)?;
            let diff = self.comparator.compare(&current, &expected);
            if diff.is_empty() {
                tracing::debug!("Panel {} matches snapshot", panel.id);
            } else {
                tracing::warn!("Panel {} differs from snapshot ({} changes)", panel.id, diff.len());
                report.mismatches.push(PanelMismatch {
                    panel_id: panel.id,
                    diff,
                });
            }
        }

        tracing::info!(
            "Compared dashboard {} against {}: {} mismatching panels, {} without snapshot",
            dashboard_uid,
            dashboard_name,
            report.mismatches.len(),
            report.missing_snapshots.len()
        );
        Ok(report)
    }

    pub fn assert_dashboard_matches_snapshots(&self, dashboard_uid: &str, dashboard_name: &str) -> Result<()> {
        let report = self.collect_dashboard_mismatches(dashboard_uid, dashboard_name)?;
        if report.is_empty() {
            return Ok(());
        }
        Err(RegressionError::Mismatch(MismatchReport::Dashboard(report)))
    }

    /// Store the current output of a panel as its new baseline.
    pub fn record_panel_snapshot(
        &self,
        dashboard_uid: &str,
        panel_id: i64,
        dashboard_name: &str,
    ) -> Result<Option<ResultSet>> {
        let Some(output) = self.fetch_panel_output(dashboard_uid, panel_id)? else {
            return Ok(None);
        };
        self.store.save(dashboard_name, panel_id, &output)?;
        self.store.record_metadata(dashboard_name, dashboard_uid, &[panel_id])?;
        Ok(Some(output))
    }

    /// Store baselines for every non-row panel; returns the recorded panel ids.
    pub fn record_dashboard_snapshots(&self, dashboard_uid: &str, dashboard_name: &str) -> Result<Vec<i64>> {
        let dashboard = self.api.get_dashboard(dashboard_uid)?;
        let mut recorded = Vec::new();
        for panel in dashboard_panels(&dashboard).iter().filter(|p| !p.is_row()) {
            let output = self.query_output(panel)?;
            self.store.save(dashboard_name, panel.id, &output)?;
            recorded.push(panel.id);
        }
        self.store.record_metadata(dashboard_name, dashboard_uid, &recorded)?;
        Ok(recorded)
    }

    pub fn snapshot_metadata(&self, dashboard_name: &str) -> Result<Option<String>> {
        self.store.metadata(dashboard_name)
    }

    fn query_output(&self, panel: &Panel) -> Result<ResultSet> {
        if panel.targets.is_empty() {
            tracing::debug!("Panel {} has no query targets", panel.id);
            return Ok(ResultSet::default());
        }

        let datasource_uid = panel
            .datasource_uid()
            .or(self.default_datasource.as_deref())
            .ok_or(RegressionError::MissingDatasource { panel_id: panel.id })?;

        let response = self.api.query_panel(datasource_uid, &panel.targets)?;
        result_set_from_response(&response)
    }
}
