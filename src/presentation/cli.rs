// Command line surface over the keyword facade
use crate::domain::record::ResultSet;
use crate::infrastructure::config::{ConfigOverrides, DEFAULT_CONFIG_PATH, load_config};
use crate::infrastructure::output::log_json;
use crate::presentation::keywords::RegressionKeywords;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "grafana-regression", version, about = "Snapshot regression checks for Grafana dashboards")]
pub struct Cli {
    /// Configuration file, extension optional
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Grafana base URL
    #[arg(long, env = "GRAFANA_URL")]
    pub url: Option<String>,

    /// API key (bearer token)
    #[arg(long, env = "GRAFANA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "GRAFANA_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "GRAFANA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Directory holding <dashboard>/panel_<id>.json baselines
    #[arg(long)]
    pub snapshot_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the panels of a dashboard
    Panels { dashboard_uid: String },
    /// Print the stored query targets of a panel
    PanelQuery { dashboard_uid: String, panel_id: i64 },
    /// Print (or save) the current output of a panel
    Fetch {
        dashboard_uid: String,
        panel_id: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the normalized form of a saved output file
    Normalize { path: PathBuf },
    /// Print the diff between a panel's output and its snapshot
    Diff {
        dashboard_uid: String,
        panel_id: i64,
        dashboard_name: String,
    },
    /// Fail when a panel's output differs from its snapshot
    Assert {
        dashboard_uid: String,
        panel_id: i64,
        dashboard_name: String,
    },
    /// Fail when any panel of a dashboard differs from its snapshot
    AssertDashboard {
        dashboard_uid: String,
        dashboard_name: String,
    },
    /// Record a panel's current output as its snapshot
    Record {
        dashboard_uid: String,
        panel_id: i64,
        dashboard_name: String,
    },
    /// Record snapshots for every panel of a dashboard
    RecordDashboard {
        dashboard_uid: String,
        dashboard_name: String,
    },
    /// Print a dashboard's snapshot metadata
    Meta { dashboard_name: String },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            snapshot_dir: self.snapshot_dir.clone(),
        }
    }

    fn needs_connection(&self) -> bool {
        !matches!(self.command, Command::Normalize { .. } | Command::Meta { .. })
    }
}

fn keywords(cli: &Cli) -> anyhow::Result<RegressionKeywords> {
    let config = load_config(&cli.config, &cli.overrides())
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    if cli.needs_connection() {
        Ok(RegressionKeywords::from_config(&config)?)
    } else {
        Ok(RegressionKeywords::offline(&config))
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let keywords = keywords(&cli)?;

    match cli.command {
        Command::Panels { dashboard_uid } => {
            log_json(&keywords.get_dashboard_panels(&dashboard_uid)?)?;
        }
        Command::PanelQuery {
            dashboard_uid,
            panel_id,
        } => {
            log_json(&keywords.get_panel_query(&dashboard_uid, panel_id)?)?;
        }
        Command::Fetch {
            dashboard_uid,
            panel_id,
            out: Some(path),
        } => {
            keywords.save_panel_output_to_file(&dashboard_uid, panel_id, &path)?;
            tracing::info!("Panel {} output written to {}", panel_id, path.display());
        }
        Command::Fetch {
            dashboard_uid,
            panel_id,
            out: None,
        } => {
            keywords.log_panel_output(&dashboard_uid, panel_id)?;
        }
        Command::Normalize { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("invalid JSON in {}", path.display()))?;
            let output = ResultSet::from_value(value)?;
            log_json(&keywords.normalize_panel_output(&output))?;
        }
        Command::Diff {
            dashboard_uid,
            panel_id,
            dashboard_name,
        } => {
            keywords.diff_panel_outputs(&dashboard_uid, panel_id, &dashboard_name)?;
        }
        Command::Assert {
            dashboard_uid,
            panel_id,
            dashboard_name,
        } => {
            keywords.assert_panel_output_matches_snapshot(&dashboard_uid, panel_id, &dashboard_name)?;
            println!("Panel {} matches snapshot", panel_id);
        }
        Command::AssertDashboard {
            dashboard_uid,
            dashboard_name,
        } => {
            keywords.compare_multiple_panels_to_snapshots(&dashboard_uid, &dashboard_name)?;
            println!("All panels of {} match their snapshots", dashboard_uid);
        }
        Command::Record {
            dashboard_uid,
            panel_id,
            dashboard_name,
        } => {
            if !keywords.record_panel_snapshot(&dashboard_uid, panel_id, &dashboard_name)? {
                anyhow::bail!("panel {} not found in dashboard {}", panel_id, dashboard_uid);
            }
        }
        Command::RecordDashboard {
            dashboard_uid,
            dashboard_name,
        } => {
            let recorded = keywords.record_dashboard_snapshots(&dashboard_uid, &dashboard_name)?;
            println!("Recorded {} panel snapshots", recorded.len());
        }
        Command::Meta { dashboard_name } => {
            keywords.print_snapshot_metadata(&dashboard_name)?;
        }
    }

    Ok(())
}
