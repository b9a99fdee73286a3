// Dashboard and panel domain model
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub panel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub targets: Vec<Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Panel {
    pub fn is_row(&self) -> bool {
        self.panel_type.as_deref() == Some("row")
    }

    /// Datasource uid from the panel, falling back to its first target.
    /// Template references such as `${DS_PROMETHEUS}` do not count.
    pub fn datasource_uid(&self) -> Option<&str> {
        let from_panel = self.datasource.as_ref().and_then(resolved_uid);
        from_panel.or_else(|| {
            self.targets
                .iter()
                .filter_map(|t| t.get("datasource"))
                .find_map(resolved_uid)
        })
    }
}

fn resolved_uid(datasource: &Value) -> Option<&str> {
    datasource
        .get("uid")
        .and_then(Value::as_str)
        .filter(|uid| !uid.is_empty() && !uid.starts_with('$'))
}

fn raw_panels(dashboard: &Value) -> &[Value] {
    dashboard
        .get("dashboard")
        .and_then(|d| d.get("panels"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// All panels of a dashboard document, with collapsed row children listed
/// right after their row. Panels that do not parse are skipped.
pub fn dashboard_panels(dashboard: &Value) -> Vec<Panel> {
    let mut panels = Vec::new();
    collect_panels(raw_panels(dashboard), &mut panels);
    panels
}

fn collect_panels(raw: &[Value], panels: &mut Vec<Panel>) {
    for value in raw {
        match Panel::deserialize(value) {
            Ok(panel) => panels.push(panel),
            Err(e) => {
                let id = value.get("id").unwrap_or(&Value::Null);
                tracing::warn!("Skipping unreadable panel {}: {}", id, e);
            }
        }
        if let Some(children) = value.get("panels").and_then(Value::as_array) {
            collect_panels(children, panels);
        }
    }
}

/// Stored targets of `panel_id`, or `None` when the dashboard has no such panel.
pub fn panel_targets(dashboard: &Value, panel_id: i64) -> Option<Vec<Value>> {
    find_panel_value(raw_panels(dashboard), panel_id).map(|panel| {
        panel
            .get("targets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    })
}

pub fn find_panel(dashboard: &Value, panel_id: i64) -> Option<Panel> {
    dashboard_panels(dashboard)
        .into_iter()
        .find(|p| p.id == panel_id)
}

fn find_panel_value(panels: &[Value], panel_id: i64) -> Option<&Value> {
    for panel in panels {
        if panel.get("id").and_then(Value::as_i64) == Some(panel_id) {
            return Some(panel);
        }
        let nested = panel
            .get("panels")
            .and_then(Value::as_array)
            .and_then(|children| find_panel_value(children, panel_id));
        if nested.is_some() {
            return nested;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dashboard() -> Value {
        json!({
            "dashboard": {
                "title": "Service",
                "panels": [
                    {"id": 5, "type": "timeseries", "targets": [{"refId": "A", "expr": "cpu_usage"}]},
                    {"id": 6, "type": "row", "collapsed": true, "panels": [
                        {"id": 7, "type": "stat", "datasource": {"type": "prometheus", "uid": "prom"},
                         "targets": [{"refId": "A"}]}
                    ]},
                    {"id": 8, "type": "text"}
                ]
            }
        })
    }

    #[test]
    fn test_panel_targets_found() {
        let targets = panel_targets(&dashboard(), 5).unwrap();
        assert_eq!(targets[0]["expr"], json!("cpu_usage"));
    }

    #[test]
    fn test_panel_targets_missing_panel() {
        assert_eq!(panel_targets(&dashboard(), 99), None);
    }

    #[test]
    fn test_panel_without_targets_is_empty_not_missing() {
        assert_eq!(panel_targets(&dashboard(), 8), Some(Vec::new()));
    }

    #[test]
    fn test_collapsed_row_children_are_listed() {
        let ids: Vec<i64> = dashboard_panels(&dashboard())
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![5, 6, 7, 8]);
        assert_eq!(panel_targets(&dashboard(), 7).map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_dashboard_without_panels() {
        assert!(dashboard_panels(&json!({"meta": {}})).is_empty());
    }

    #[test]
    fn test_datasource_uid_resolution() {
        let panel = find_panel(&dashboard(), 7).unwrap();
        assert_eq!(panel.datasource_uid(), Some("prom"));

        let from_target: Panel = serde_json::from_value(json!({
            "id": 1,
            "datasource": {"uid": "${DS_PROMETHEUS}"},
            "targets": [{"refId": "A", "datasource": {"uid": "influx"}}]
        }))
        .unwrap();
        assert_eq!(from_target.datasource_uid(), Some("influx"));

        let unresolved: Panel = serde_json::from_value(json!({"id": 2, "targets": []})).unwrap();
        assert_eq!(unresolved.datasource_uid(), None);
    }

    #[test]
    fn test_row_detection() {
        let panel = find_panel(&dashboard(), 6).unwrap();
        assert!(panel.is_row());
    }

    #[test]
    fn test_unreadable_panels_are_skipped() {
        let dashboard = json!({
            "dashboard": {
                "panels": [
                    {"type": "text", "title": "no id"},
                    {"id": 1, "targets": null},
                    {"id": 2, "type": "row", "panels": [
                        {"id": "bad"},
                        {"id": 3, "targets": [{"refId": "A"}]}
                    ]}
                ]
            }
        });

        let ids: Vec<i64> = dashboard_panels(&dashboard).iter().map(|p| p.id).collect();

        assert_eq!(ids, vec![1, 2, 3]);
        assert!(find_panel(&dashboard, 1).unwrap().targets.is_empty());
        assert_eq!(find_panel(&dashboard, 3).unwrap().targets.len(), 1);
    }
}
