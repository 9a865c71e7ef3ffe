//! Estimator configuration

use crate::error::{EstimationError, Result};
use crate::predictor::{ForestConfig, MIN_TRAINING_SAMPLES};
use serde::Deserialize;
use std::path::PathBuf;

/// Estimator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    /// SQLite task database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Model artifact location
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Historical tasks fetched as prediction context
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Completed tasks fetched for insights when no project is given
    #[serde(default = "default_insights_limit")]
    pub insights_limit: usize,

    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,
}

fn claude_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
}

fn default_db_path() -> PathBuf {
    claude_dir().join("pm.db")
}

fn default_model_path() -> PathBuf {
    claude_dir().join("pm_ml_model.bin")
}

fn default_history_limit() -> usize {
    100
}

fn default_insights_limit() -> usize {
    200
}

fn default_n_trees() -> usize {
    ForestConfig::default().n_trees
}

fn default_max_depth() -> usize {
    ForestConfig::default().max_depth
}

fn default_seed() -> u64 {
    ForestConfig::default().seed
}

fn default_min_training_samples() -> usize {
    MIN_TRAINING_SAMPLES
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            model_path: default_model_path(),
            history_limit: default_history_limit(),
            insights_limit: default_insights_limit(),
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            seed: default_seed(),
            min_training_samples: default_min_training_samples(),
        }
    }
}

impl EstimatorConfig {
    /// Load configuration from `PM_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("PM").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| EstimationError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| EstimationError::Config(e.to_string()))
    }

    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            seed: self.seed,
            ..Default::default()
        }
    }
}
