// Error types shared by every layer
use crate::domain::diff::Diff;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegressionError>;

#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("authentication required: provide either an API key or username/password")]
    MissingCredentials,

    #[error("no Grafana connection configured; set credentials first")]
    NotConfigured,

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("panel {panel_id} has no resolvable datasource uid and no default datasource is configured")]
    MissingDatasource { panel_id: i64 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("query {ref_id} failed: {message}")]
    QueryFailed { ref_id: String, message: String },

    #[error("invalid result record at index {index}: expected an object, found {found}")]
    InvalidRecord { index: usize, found: &'static str },

    #[error("expected a JSON array of result records, found {0}")]
    NotAResultSet(&'static str),

    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot not found: {}", path.display())]
    SnapshotNotFound { path: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot metadata in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0}")]
    Mismatch(MismatchReport),
}

impl RegressionError {
    /// True when the error is a detected regression rather than an
    /// infrastructure or input problem.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, RegressionError::Mismatch(_))
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        RegressionError::Json {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegressionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// One panel whose output drifted from its snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelMismatch {
    pub panel_id: i64,
    pub diff: Diff,
}

/// Outcome of comparing every panel of a dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardMismatches {
    pub mismatches: Vec<PanelMismatch>,
    /// Panels compared without a recorded baseline.
    pub missing_snapshots: Vec<i64>,
}

impl DashboardMismatches {
    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty() && self.missing_snapshots.is_empty()
    }
}

/// Payload of a failed snapshot assertion.
#[derive(Debug, Clone, PartialEq)]
pub enum MismatchReport {
    Panel(PanelMismatch),
    Dashboard(DashboardMismatches),
}

impl MismatchReport {
    pub fn mismatches(&self) -> &[PanelMismatch] {
        match self {
            MismatchReport::Panel(mismatch) => std::slice::from_ref(mismatch),
            MismatchReport::Dashboard(report) => &report.mismatches,
        }
    }
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReport::Panel(mismatch) => {
                write!(f, "Panel output does not match snapshot:\n{}", mismatch.diff)
            }
            MismatchReport::Dashboard(report) => {
                write!(f, "Mismatches found in {} panel(s):", report.mismatches.len())?;
                for mismatch in &report.mismatches {
                    write!(f, "\npanel {}:\n{}", mismatch.panel_id, mismatch.diff)?;
                }
                if !report.missing_snapshots.is_empty() {
                    let ids: Vec<String> = report.missing_snapshots.iter().map(i64::to_string).collect();
                    write!(f, "\nNo snapshot recorded for panel(s): {}", ids.join(", "))?;
                }
                Ok(())
            }
        }
    }
}
