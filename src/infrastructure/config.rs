use crate::domain::diff::{DEFAULT_CUTOFF_DISTANCE_FOR_PAIRS, DiffOptions};
use crate::domain::query::TimeRange;
use crate::domain::record::{DEFAULT_VOLATILE_FIELDS, Normalizer};
use crate::domain::snapshot::SnapshotComparator;
use crate::error::{RegressionError, Result};
use crate::infrastructure::grafana_client::{Credentials, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/grafana";
pub const ENV_PREFIX: &str = "GRAFANA_REGRESSION";

#[derive(Debug, Deserialize, Clone)]
pub struct RegressionConfig {
    /// Absent for offline use (normalizing files, reading snapshot metadata).
    #[serde(default)]
    pub grafana: Option<GrafanaSettings>,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub snapshots: SnapshotSettings,
    #[serde(default)]
    pub comparison: ComparisonSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrafanaSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub default_datasource_uid: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QuerySettings {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotSettings {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
        }
    }
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComparisonSettings {
    #[serde(default = "default_volatile_fields")]
    pub volatile_fields: Vec<String>,
    #[serde(default)]
    pub ordered_fields: Vec<String>,
    #[serde(default = "default_cutoff")]
    pub cutoff_distance_for_pairs: f64,
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            volatile_fields: default_volatile_fields(),
            ordered_fields: Vec::new(),
            cutoff_distance_for_pairs: default_cutoff(),
        }
    }
}

fn default_volatile_fields() -> Vec<String> {
    DEFAULT_VOLATILE_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_cutoff() -> f64 {
    DEFAULT_CUTOFF_DISTANCE_FOR_PAIRS
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub snapshot_dir: Option<String>,
}

impl RegressionConfig {
    pub fn grafana(&self) -> Result<&GrafanaSettings> {
        self.grafana.as_ref().ok_or(RegressionError::NotConfigured)
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let grafana = self.grafana()?;
        Credentials::resolve(
            grafana.api_key.clone(),
            grafana.username.clone(),
            grafana.password.clone(),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.grafana
            .as_ref()
            .and_then(|g| g.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            from: self.query.from.clone(),
            to: self.query.to.clone(),
        }
    }

    pub fn comparator(&self) -> SnapshotComparator {
        let options = DiffOptions {
            cutoff_distance_for_pairs: self.comparison.cutoff_distance_for_pairs,
            ..DiffOptions::default()
        }
        .ordered(self.comparison.ordered_fields.iter().cloned());
        SnapshotComparator::new(
            Normalizer::with_fields(self.comparison.volatile_fields.iter().cloned()),
            options,
        )
    }
}

/// Layered load: optional config file, then `GRAFANA_REGRESSION__SECTION__KEY`
/// environment variables, then command-line overrides.
pub fn load_config(path: &str, overrides: &ConfigOverrides) -> anyhow::Result<RegressionConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .set_override_option("grafana.url", overrides.url.clone())?
        .set_override_option("grafana.api_key", overrides.api_key.clone())?
        .set_override_option("grafana.username", overrides.username.clone())?
        .set_override_option("grafana.password", overrides.password.clone())?
        .set_override_option("snapshots.dir", overrides.snapshot_dir.clone())?
        .build()?;

    Ok(settings.try_deserialize()?)
}
