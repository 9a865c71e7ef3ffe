//! Estimation service
//!
//! `EstimationService` is the owned context that ties a task store to an
//! estimation model. Callers build one at startup and pass it to whatever
//! needs predictions; there is no process-wide model instance.

use crate::config::EstimatorConfig;
use crate::error::{EstimationError, Result};
use crate::insights::{LearningInsights, TrainingOutcome, INSIGHTS_TRAINING_THRESHOLD};
use crate::models::{BufferRecommendation, Prediction, TaskRecord, TaskType, TrainingReport};
use crate::observability::{EstimatorMetrics, StructuredLogger};
use crate::predictor::EstimationModel;
use crate::store::{TaskQuery, TaskStore};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Status value marking a completed task
pub const COMPLETED_STATUS: &str = "done";

pub struct EstimationService<S: TaskStore> {
    store: S,
    model: EstimationModel,
    model_path: PathBuf,
    history_limit: usize,
    insights_limit: usize,
    metrics: EstimatorMetrics,
    logger: StructuredLogger,
}

impl<S: TaskStore> EstimationService<S> {
    /// Wrap an existing model. Nothing is read from `model_path` until a
    /// training run saves to it.
    pub fn new(store: S, model: EstimationModel, model_path: impl Into<PathBuf>) -> Self {
        let metrics = EstimatorMetrics::new();
        metrics.set_model_trained(model.is_trained());
        Self {
            store,
            model,
            model_path: model_path.into(),
            history_limit: 100,
            insights_limit: 200,
            metrics,
            logger: StructuredLogger::new("estimation-service"),
        }
    }

    /// Build from configuration, restoring the saved model when one exists
    pub fn from_config(store: S, config: &EstimatorConfig) -> Self {
        let mut model = EstimationModel::with_config(config.forest_config())
            .with_min_training_samples(config.min_training_samples);
        let logger = StructuredLogger::new("estimation-service");

        if config.model_path.exists() {
            match model.reload(&config.model_path) {
                Ok(()) => {
                    logger.log_model_load(&config.model_path, None);
                    if *model.config() != config.forest_config() {
                        debug!(
                            path = %config.model_path.display(),
                            saved = ?model.config(),
                            configured = ?config.forest_config(),
                            "Using forest settings stored in the model artifact"
                        );
                    }
                    if model.min_training_samples() != config.min_training_samples {
                        debug!(
                            saved = model.min_training_samples(),
                            configured = config.min_training_samples,
                            "Keeping configured training threshold over the artifact's"
                        );
                    }
                }
                Err(e) => logger.log_model_load(&config.model_path, Some(&e.to_string())),
            }
        } else {
            debug!(path = %config.model_path.display(), "No model artifact, starting untrained");
        }
        let model = model.with_min_training_samples(config.min_training_samples);

        let mut service = Self::new(store, model, &config.model_path)
            .with_history_limit(config.history_limit)
            .with_insights_limit(config.insights_limit);
        service.logger = logger;
        service
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn with_insights_limit(mut self, insights_limit: usize) -> Self {
        self.insights_limit = insights_limit;
        self
    }

    pub fn model(&self) -> &EstimationModel {
        &self.model
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Same-project tasks with a positive estimate. A task without a
    /// project has no history.
    pub fn historical_context(&self, task: &TaskRecord) -> Result<Vec<TaskRecord>> {
        let Some(project_id) = &task.project_id else {
            return Ok(Vec::new());
        };
        self.store.query_tasks(
            &TaskQuery::new()
                .project(project_id.clone())
                .with_estimate()
                .limit(self.history_limit),
        )
    }

    /// Predict story points for a stored task, optionally as another type
    pub fn predict_task(&self, task_id: &str, type_override: Option<TaskType>) -> Result<Prediction> {
        let start = Instant::now();
        let result = self.load_task(task_id, type_override).and_then(|(task, historical)| {
            self.model.predict(&task, &historical)
        });

        match &result {
            Ok(prediction) => {
                self.metrics.inc_predictions(prediction.method.as_str());
                self.logger.log_prediction(task_id, prediction);
            }
            Err(_) => self.metrics.inc_prediction_errors(),
        }
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        result
    }

    /// Risk-adjusted estimate for a stored task
    pub fn suggest_buffer(&self, task_id: &str) -> Result<BufferRecommendation> {
        let start = Instant::now();
        let result = self.load_task(task_id, None).and_then(|(task, historical)| {
            self.model.predict(&task, &historical)
        });

        let recommendation = match result {
            Ok(prediction) => {
                self.metrics.inc_predictions(prediction.method.as_str());
                self.model.advisor().recommend(&prediction)
            }
            Err(e) => {
                self.metrics.inc_prediction_errors();
                self.metrics
                    .observe_prediction_latency(start.elapsed().as_secs_f64());
                return Err(e);
            }
        };
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        self.logger.log_buffer(task_id, &recommendation);
        Ok(recommendation)
    }

    /// Train on completed tasks, for one project or across all of them,
    /// and save the model on success.
    pub fn train(&mut self, project_id: Option<&str>) -> Result<TrainingReport> {
        let tasks = self.completed_tasks(project_id)?;
        self.train_on(&tasks)
    }

    /// Summarise completed work; with enough tasks, also retrain
    pub fn learning_insights(&mut self, project_id: Option<&str>) -> Result<LearningInsights> {
        let tasks = self.completed_tasks(project_id)?;
        let insights = LearningInsights::from_tasks(&tasks);

        if tasks.len() < INSIGHTS_TRAINING_THRESHOLD {
            return Ok(insights);
        }

        let outcome = match self.train_on(&tasks) {
            Ok(report) => TrainingOutcome::Trained(report),
            Err(e @ EstimationError::InsufficientData { .. }) => TrainingOutcome::Skipped {
                reason: e.to_string(),
            },
            Err(e) => return Err(e),
        };
        Ok(insights.with_training(outcome))
    }

    fn completed_tasks(&self, project_id: Option<&str>) -> Result<Vec<TaskRecord>> {
        let query = match project_id {
            Some(project_id) => TaskQuery::new().project(project_id).status(COMPLETED_STATUS),
            None => TaskQuery::new()
                .status(COMPLETED_STATUS)
                .limit(self.insights_limit),
        };
        self.store.query_tasks(&query)
    }

    fn load_task(
        &self,
        task_id: &str,
        type_override: Option<TaskType>,
    ) -> Result<(TaskRecord, Vec<TaskRecord>)> {
        let mut task = self.store.get_task(task_id)?;
        if let Some(task_type) = type_override {
            task.task_type = task_type;
        }
        let historical = self.historical_context(&task)?;
        Ok((task, historical))
    }

    fn train_on(&mut self, tasks: &[TaskRecord]) -> Result<TrainingReport> {
        let start = Instant::now();
        let mut next = self.model.clone();
        let result = next.train(tasks);
        self.metrics
            .observe_training_latency(start.elapsed().as_secs_f64());

        let report = match result {
            Ok(report) => report,
            Err(EstimationError::InsufficientData { required, found }) => {
                self.metrics.inc_training_runs("insufficient_data");
                self.logger.log_training_skipped(found, required);
                return Err(EstimationError::InsufficientData { required, found });
            }
            Err(e) => {
                self.metrics.inc_training_runs("failed");
                return Err(e);
            }
        };

        // Only a saved model replaces the current one
        let info = match next.save(&self.model_path) {
            Ok(info) => info,
            Err(e) => {
                self.metrics.inc_training_runs("failed");
                return Err(e);
            }
        };
        self.model = next;

        self.metrics.inc_training_runs("trained");
        self.metrics.set_training_samples(report.samples as i64);
        self.metrics.set_model_trained(true);
        self.logger.log_model_trained(&report);
        self.logger.log_model_saved(&info.path, &info.checksum);
        Ok(report)
    }
}
