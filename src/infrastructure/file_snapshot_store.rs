// File-backed snapshot store: <dir>/<dashboard>/panel_<id>.json + meta.yaml
use crate::application::snapshot_store::{SnapshotMeta, SnapshotStore};
use crate::domain::record::ResultSet;
use crate::error::{RegressionError, Result};
use crate::infrastructure::output::save_to_file;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const META_FILE: &str = "meta.yaml";

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self, dashboard_name: &str, panel_id: i64) -> PathBuf {
        self.root
            .join(dashboard_name)
            .join(format!("panel_{}.json", panel_id))
    }

    pub fn meta_path(&self, dashboard_name: &str) -> PathBuf {
        self.root.join(dashboard_name).join(META_FILE)
    }

    fn read_existing_meta(&self, path: &Path) -> Result<Option<SnapshotMeta>> {
        match fs::read_to_string(path) {
            Ok(text) => serde_yaml::from_str(&text)
                .map(Some)
                .map_err(|source| RegressionError::Yaml {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegressionError::io(path, e)),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, dashboard_name: &str, panel_id: i64) -> Result<ResultSet> {
        let path = self.snapshot_path(dashboard_name, panel_id);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RegressionError::SnapshotNotFound { path: path.clone() },
            _ => RegressionError::io(&path, e),
        })?;

        let value = serde_json::from_str(&text)
            .map_err(|e| RegressionError::json(path.display().to_string(), e))?;
        let snapshot = ResultSet::from_value(value)?;
        tracing::debug!(
            "Loaded snapshot {} with {} records",
            path.display(),
            snapshot.len()
        );
        Ok(snapshot)
    }

    fn save(&self, dashboard_name: &str, panel_id: i64, output: &ResultSet) -> Result<()> {
        let path = self.snapshot_path(dashboard_name, panel_id);
        save_to_file(output, &path)?;
        tracing::info!("Snapshot for panel {} written to {}", panel_id, path.display());
        Ok(())
    }

    fn metadata(&self, dashboard_name: &str) -> Result<Option<String>> {
        let path = self.meta_path(dashboard_name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegressionError::io(path, e)),
        }
    }

    fn record_metadata(&self, dashboard_name: &str, dashboard_uid: &str, panel_ids: &[i64]) -> Result<SnapshotMeta> {
        let path = self.meta_path(dashboard_name);

        let mut panels = self
            .read_existing_meta(&path)?
            .filter(|meta| meta.dashboard_uid == dashboard_uid)
            .map(|meta| meta.panels)
            .unwrap_or_default();
        panels.extend_from_slice(panel_ids);
        panels.sort_unstable();
        panels.dedup();

        let meta = SnapshotMeta {
            dashboard_name: dashboard_name.to_string(),
            dashboard_uid: dashboard_uid.to_string(),
            recorded_at: chrono::Utc::now(),
            panels,
        };

        let text = serde_yaml::to_string(&meta).map_err(|source| RegressionError::Yaml {
            path: path.clone(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RegressionError::io(parent, e))?;
        }
        fs::write(&path, text).map_err(|e| RegressionError::io(&path, e))?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileSnapshotStore) {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, store) = store();
        let output = ResultSet::from_value(json!([{"value": 1, "timestamp": "t"}])).unwrap();

        store.save("service", 3, &output).unwrap();

        assert!(store.snapshot_path("service", 3).ends_with("service/panel_3.json"));
        assert_eq!(store.load("service", 3).unwrap(), output);
    }

    #[test]
    fn test_missing_snapshot() {
        let (_dir, store) = store();
        let err = store.load("service", 1).unwrap_err();
        assert!(matches!(err, RegressionError::SnapshotNotFound { .. }));
    }

    #[test]
    fn test_snapshot_with_invalid_record() {
        let (_dir, store) = store();
        let path = store.snapshot_path("service", 1);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"[{"value": 1}, "oops"]"#).unwrap();

        let err = store.load("service", 1).unwrap_err();

        assert!(matches!(err, RegressionError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn test_snapshot_with_broken_json() {
        let (_dir, store) = store();
        let path = store.snapshot_path("service", 1);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[{").unwrap();

        assert!(matches!(store.load("service", 1), Err(RegressionError::Json { .. })));
    }

    #[test]
    fn test_metadata_absent() {
        let (_dir, store) = store();
        assert_eq!(store.metadata("service").unwrap(), None);
    }

    #[test]
    fn test_record_metadata_merges_panels() {
        let (_dir, store) = store();

        store.record_metadata("service", "abc", &[4]).unwrap();
        let meta = store.record_metadata("service", "abc", &[2, 4]).unwrap();

        assert_eq!(meta.panels, vec![2, 4]);
        let text = store.metadata("service").unwrap().unwrap();
        assert!(text.contains("dashboard_uid: abc"));
        assert!(text.contains("recorded_at"));
    }

    #[test]
    fn test_record_metadata_resets_on_new_dashboard_uid() {
        let (_dir, store) = store();

        store.record_metadata("service", "old", &[1, 2]).unwrap();
        let meta = store.record_metadata("service", "new", &[3]).unwrap();

        assert_eq!(meta.panels, vec![3]);
    }
}
