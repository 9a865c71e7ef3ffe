//! Trainable story point model
//!
//! `EstimationModel` starts untrained and answers with the rule-based
//! fallback. A successful `train` swaps in a fitted scaler and regression
//! forest in one step; a failed one leaves the previous state in place.

use super::buffer::BufferAdvisor;
use super::fallback::FallbackEstimator;
use super::forest::{ForestConfig, RandomForest};
use super::scaler::StandardScaler;
use super::Estimator;
use crate::complexity::complexity_score;
use crate::error::{EstimationError, Result};
use crate::features::FeatureExtractor;
use crate::models::{
    round_half_even, BufferRecommendation, EstimationMethod, Prediction, TaskRecord,
    TrainingReport,
};
use crate::persistence::{self, ArtifactInfo};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Minimum number of estimated tasks required to train
pub const MIN_TRAINING_SAMPLES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
struct TrainedState {
    scaler: StandardScaler,
    forest: RandomForest,
}

/// Everything that survives a save/load cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelSnapshot {
    feature_names: Vec<String>,
    scaler: Option<StandardScaler>,
    forest: Option<RandomForest>,
    is_trained: bool,
    config: ForestConfig,
    min_training_samples: usize,
    trained_at: Option<i64>,
}

/// Story point estimation model with rule-based fallback
#[derive(Debug, Clone)]
pub struct EstimationModel {
    config: ForestConfig,
    min_training_samples: usize,
    extractor: FeatureExtractor,
    advisor: BufferAdvisor,
    /// Frozen on the first successful training run
    feature_names: Vec<String>,
    trained: Option<TrainedState>,
    trained_at: Option<i64>,
}

impl EstimationModel {
    /// Create an untrained model with the default forest settings
    pub fn new() -> Self {
        Self::with_config(ForestConfig::default())
    }

    pub fn with_config(config: ForestConfig) -> Self {
        Self {
            config,
            min_training_samples: MIN_TRAINING_SAMPLES,
            extractor: FeatureExtractor::new(),
            advisor: BufferAdvisor::new(),
            feature_names: Vec::new(),
            trained: None,
            trained_at: None,
        }
    }

    pub fn with_min_training_samples(mut self, min_training_samples: usize) -> Self {
        self.min_training_samples = min_training_samples.max(1);
        self
    }

    pub fn with_advisor(mut self, advisor: BufferAdvisor) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }

    pub fn min_training_samples(&self) -> usize {
        self.min_training_samples
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn advisor(&self) -> &BufferAdvisor {
        &self.advisor
    }

    pub fn trained_at(&self) -> Option<i64> {
        self.trained_at
    }

    pub fn forest(&self) -> Option<&RandomForest> {
        self.trained.as_ref().map(|s| &s.forest)
    }

    /// Fit the scaler and forest on tasks with a positive estimate.
    ///
    /// Every training row is extracted against the whole qualifying set as
    /// its historical context, the row's own task included.
    pub fn train(&mut self, tasks: &[TaskRecord]) -> Result<TrainingReport> {
        let start = Instant::now();
        let context: Vec<TaskRecord> = tasks
            .iter()
            .filter(|t| t.valid_estimate().is_some())
            .cloned()
            .collect();

        if context.len() < self.min_training_samples {
            warn!(
                found = context.len(),
                required = self.min_training_samples,
                "Not enough estimated tasks to train"
            );
            return Err(EstimationError::InsufficientData {
                required: self.min_training_samples,
                found: context.len(),
            });
        }

        let targets: Vec<f64> = context.iter().filter_map(TaskRecord::valid_estimate).collect();
        let mut rows = Vec::with_capacity(context.len());
        let mut names: Option<Vec<String>> = None;

        for task in &context {
            let features = self.extractor.extract(task, &context);
            match &names {
                None => names = Some(features.names().to_vec()),
                Some(expected) => check_names(expected, features.names())?,
            }
            rows.push(features.values().to_vec());
        }

        let names = names.unwrap_or_default();
        if !self.feature_names.is_empty() {
            check_names(&self.feature_names, &names)?;
        }

        let scaler = StandardScaler::fit(&rows);
        let scaled = scaler.transform_all(&rows);
        let forest = RandomForest::fit(&scaled, &targets, &self.config)?;

        let fitted: Vec<f64> = scaled.iter().map(|r| forest.predict(r)).collect();
        let trained_at = chrono::Utc::now().timestamp();
        let report = TrainingReport {
            samples: context.len(),
            r2_score: r2_score(&targets, &fitted),
            mae: mean_absolute_error(&targets, &fitted),
            feature_count: names.len(),
            trained_at,
        };

        self.feature_names = names;
        self.trained = Some(TrainedState { scaler, forest });
        self.trained_at = Some(trained_at);

        info!(
            samples = report.samples,
            r2_score = report.r2_score,
            mae = report.mae,
            feature_count = report.feature_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Estimation model trained"
        );

        Ok(report)
    }

    /// Predict story points; falls back to the complexity heuristic while
    /// untrained.
    pub fn predict(&self, task: &TaskRecord, historical: &[TaskRecord]) -> Result<Prediction> {
        let Some(state) = &self.trained else {
            debug!(task_id = %task.id, "No trained model, using rule-based estimate");
            return Ok(FallbackEstimator::predict(task));
        };

        let features = self.extractor.extract(task, historical);
        check_names(&self.feature_names, features.names())?;

        let scaled = state.scaler.transform(features.values());
        let (mean, spread) = state.forest.predict_with_spread(&scaled);
        let confidence = 1.0 / (1.0 + spread);

        debug!(
            task_id = %task.id,
            raw_prediction = mean,
            spread = spread,
            confidence = confidence,
            "Ensemble prediction"
        );

        Ok(Prediction {
            predicted_points: round_half_even(mean).max(0.0) as u32,
            confidence,
            method: EstimationMethod::Ml,
            complexity_score: complexity_score(task),
            raw_prediction: Some(mean),
        })
    }

    /// Predict, then widen the estimate by a confidence- and
    /// complexity-weighted buffer.
    pub fn suggest_buffer(
        &self,
        task: &TaskRecord,
        historical: &[TaskRecord],
    ) -> Result<BufferRecommendation> {
        self.advisor.suggest(self, task, historical)
    }

    /// Write the full model state to `path`
    pub fn save(&self, path: &Path) -> Result<ArtifactInfo> {
        let info = persistence::write_artifact(path, &self.snapshot())?;
        info!(
            path = %path.display(),
            checksum = %info.checksum,
            size_bytes = info.size_bytes,
            trained = self.is_trained(),
            "Estimation model saved"
        );
        Ok(info)
    }

    /// Restore a model previously written by `save`
    pub fn load(path: &Path) -> Result<Self> {
        let snapshot: ModelSnapshot = persistence::read_artifact(path)?;
        let model = Self::from_snapshot(snapshot)?;
        info!(
            path = %path.display(),
            trained = model.is_trained(),
            features = model.feature_names.len(),
            "Estimation model loaded"
        );
        Ok(model)
    }

    /// Replace this model's state from `path`. On failure the current
    /// state is kept.
    pub fn reload(&mut self, path: &Path) -> Result<()> {
        let loaded = Self::load(path)?;
        let advisor = std::mem::take(&mut self.advisor);
        *self = loaded.with_advisor(advisor);
        Ok(())
    }

    /// Load `path` if it exists, otherwise start untrained. A corrupt
    /// artifact is logged and ignored.
    pub fn open(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No model artifact, starting untrained");
            return Self::new();
        }
        match Self::load(path) {
            Ok(model) => model,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load model artifact, starting untrained"
                );
                Self::new()
            }
        }
    }

    fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            feature_names: self.feature_names.clone(),
            scaler: self.trained.as_ref().map(|s| s.scaler.clone()),
            forest: self.trained.as_ref().map(|s| s.forest.clone()),
            is_trained: self.is_trained(),
            config: self.config.clone(),
            min_training_samples: self.min_training_samples,
            trained_at: self.trained_at,
        }
    }

    fn from_snapshot(snapshot: ModelSnapshot) -> Result<Self> {
        let incompatible =
            |msg: String| EstimationError::Persistence(format!("Incompatible model artifact: {}", msg));

        let trained = match (snapshot.is_trained, snapshot.scaler, snapshot.forest) {
            (true, Some(scaler), Some(forest)) => {
                let width = snapshot.feature_names.len();
                if width == 0 {
                    return Err(incompatible("trained model without feature names".to_string()));
                }
                if scaler.width() != width || forest.n_features() != width {
                    return Err(incompatible(format!(
                        "{} feature names but scaler width {} and forest width {}",
                        width,
                        scaler.width(),
                        forest.n_features()
                    )));
                }
                forest.validate().map_err(incompatible)?;
                Some(TrainedState { scaler, forest })
            }
            (false, None, None) => None,
            (is_trained, scaler, forest) => {
                return Err(incompatible(format!(
                    "trained flag {} with scaler present {} and forest present {}",
                    is_trained,
                    scaler.is_some(),
                    forest.is_some()
                )));
            }
        };

        Ok(Self {
            config: snapshot.config,
            min_training_samples: snapshot.min_training_samples.max(1),
            extractor: FeatureExtractor::new(),
            advisor: BufferAdvisor::new(),
            feature_names: snapshot.feature_names,
            trained,
            trained_at: snapshot.trained_at,
        })
    }
}

impl Default for EstimationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for EstimationModel {
    fn estimate(&self, task: &TaskRecord, historical: &[TaskRecord]) -> Result<Prediction> {
        self.predict(task, historical)
    }
}

fn check_names(expected: &[String], got: &[String]) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(EstimationError::FeatureMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        })
    }
}

/// Coefficient of determination. Zero-variance targets score 1.0 when fitted
/// exactly and 0.0 otherwise.
fn r2_score(targets: &[f64], fitted: &[f64]) -> f64 {
    let n = targets.len() as f64;
    let mean = targets.iter().sum::<f64>() / n;
    let ss_tot: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = targets
        .iter()
        .zip(fitted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();

    if ss_tot <= f64::EPSILON {
        if ss_res <= f64::EPSILON {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

fn mean_absolute_error(targets: &[f64], fitted: &[f64]) -> f64 {
    let total: f64 = targets.iter().zip(fitted).map(|(y, p)| (y - p).abs()).sum();
    total / targets.len() as f64
}
