//! Configuration for analysis runs.
//!
//! Loaded from (in priority order):
//! 1. Environment variables (`STIXGRAPH__ANALYSIS__*`)
//! 2. Config file (`stixgraph.toml`, `[analysis]` section)
//! 3. Defaults

use serde::Deserialize;

use crate::error::Result;

/// Tunables for the in-memory analysis pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Seed for the Louvain node visiting order.
    #[serde(default = "default_seed")]
    pub louvain_seed: u64,

    /// Drop revoked and deprecated objects when loading.
    #[serde(default)]
    pub skip_revoked: bool,

    /// Row limit for the canned analytical queries.
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,
}

fn default_seed() -> u64 {
    42
}

fn default_report_limit() -> usize {
    5
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            louvain_seed: default_seed(),
            skip_revoked: false,
            report_limit: default_report_limit(),
        }
    }
}

/// Build the layered config source for a file prefix (`stixgraph` → `stixgraph.toml`).
pub fn layered(file_prefix: &str) -> Result<config::Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("STIXGRAPH")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Load the `[analysis]` section, falling back to defaults when absent.
pub fn load_analysis_config(file_prefix: &str) -> Result<AnalysisConfig> {
    let cfg = layered(file_prefix)?;
    match cfg.get::<AnalysisConfig>("analysis") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(AnalysisConfig::default()),
        Err(e) => Err(e.into()),
    }
}
