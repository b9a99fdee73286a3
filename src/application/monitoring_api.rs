// Port for the monitoring platform's HTTP API
use crate::domain::dashboard::{Panel, dashboard_panels, panel_targets};
use crate::error::Result;
use serde_json::Value;

pub trait MonitoringApi: Send + Sync {
    /// Fetch the full dashboard document (`{"dashboard": {...}, "meta": {...}}`)
    fn get_dashboard(&self, uid: &str) -> Result<Value>;

    /// Execute the given panel targets against a datasource and return the raw response
    fn query_panel(&self, datasource_uid: &str, targets: &[Value]) -> Result<Value>;

    /// List the panels of a dashboard, including children of collapsed rows
    fn get_dashboard_panels(&self, uid: &str) -> Result<Vec<Panel>> {
        let dashboard = self.get_dashboard(uid)?;
        let panels = dashboard_panels(&dashboard);
        tracing::info!("Found {} panels in dashboard {}", panels.len(), uid);
        Ok(panels)
    }

    /// Stored query targets of a panel, `None` when the panel does not exist
    fn get_panel_query(&self, dashboard: &Value, panel_id: i64) -> Option<Vec<Value>> {
        let targets = panel_targets(dashboard, panel_id);
        match &targets {
            Some(_) => tracing::info!("Panel {} found", panel_id),
            None => tracing::warn!("Panel {} not found", panel_id),
        }
        targets
    }
}
