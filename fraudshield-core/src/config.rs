//! Configuration for the analytics pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> `fraudshield.toml`
//! -> `FRAUDSHIELD_*` environment variables.

use crate::error::CoreError;
use crate::store::LogPaths;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the pipeline and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the log files.
    pub data_dir: PathBuf,
    /// Tail window for decision loading.
    pub decision_limit: usize,
    /// Tail window for the probability time series.
    pub timeseries_limit: usize,
    /// Tail window for SHAP aggregation.
    pub shap_limit: usize,
    /// Rows generated for the synthetic fairness dataset.
    pub synthetic_rows: usize,
    /// Seed for synthetic generation and mitigation sampling.
    pub seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            decision_limit: 500,
            timeseries_limit: 200,
            shap_limit: 400,
            synthetic_rows: 1500,
            seed: 42,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then an optional `fraudshield.toml` in
    /// `dir` (or the current directory), then `FRAUDSHIELD_*` environment
    /// variables.
    pub fn load(dir: Option<&Path>) -> Result<Self, CoreError> {
        let toml_path = dir
            .map(|d| d.join("fraudshield.toml"))
            .unwrap_or_else(|| PathBuf::from("fraudshield.toml"));
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("FRAUDSHIELD_"))
            .extract()
            .map_err(|e| CoreError::config(e.to_string()))
    }

    /// The well-known log file locations under the configured data dir.
    pub fn log_paths(&self) -> LogPaths {
        LogPaths::new(&self.data_dir)
    }
}
