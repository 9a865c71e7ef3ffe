//! Tests for the estimation model: training, prediction and persistence

use super::*;
use crate::error::EstimationError;
use crate::models::{round_half_even, EstimationMethod, Priority, TaskRecord, TaskType};
use tempfile::TempDir;

fn estimated_tasks(n: usize) -> Vec<TaskRecord> {
    (0..n)
        .map(|i| {
            let task_type = TaskType::ALL[i % TaskType::ALL.len()];
            TaskRecord::new(
                format!("t{}", i),
                task_type,
                format!("implement {} api endpoint", "part ".repeat(i % 4 + 1)),
            )
            .with_priority(if i % 3 == 0 { Priority::High } else { Priority::Medium })
            .with_description("x".repeat(i * 40))
            .with_project("p1")
            .with_estimate((i % 8 + 1) as f64)
        })
        .collect()
}

fn trained_model() -> (EstimationModel, Vec<TaskRecord>) {
    let tasks = estimated_tasks(20);
    let mut model = EstimationModel::new();
    model.train(&tasks).unwrap();
    (model, tasks)
}

#[test]
fn test_untrained_model_uses_rule_based() {
    let model = EstimationModel::new();
    let task = TaskRecord::new("t", TaskType::Story, "login page");

    let prediction = model.predict(&task, &[]).unwrap();
    assert!(!model.is_trained());
    assert_eq!(prediction.method, EstimationMethod::RuleBased);
    assert_eq!(prediction.confidence, RULE_BASED_CONFIDENCE);
    assert_eq!(prediction.predicted_points, 5);
    assert!(prediction.raw_prediction.is_none());
}

#[test]
fn test_training_requires_minimum_samples() {
    let mut model = EstimationModel::new();
    let result = model.train(&estimated_tasks(9));
    assert!(matches!(
        result,
        Err(EstimationError::InsufficientData { required: 10, found: 9 })
    ));
    assert!(!model.is_trained());
    assert!(model.feature_names().is_empty());

    let report = model.train(&estimated_tasks(10)).unwrap();
    assert_eq!(report.samples, 10);
    assert!(model.is_trained());
}

#[test]
fn test_tasks_without_estimate_are_ignored() {
    let mut tasks = estimated_tasks(9);
    tasks.push(TaskRecord::new("zero", TaskType::Bug, "fix").with_estimate(0.0));
    tasks.push(TaskRecord::new("none", TaskType::Bug, "fix"));

    let mut model = EstimationModel::new();
    assert!(matches!(
        model.train(&tasks),
        Err(EstimationError::InsufficientData { found: 9, .. })
    ));
}

#[test]
fn test_training_report() {
    let (model, _) = trained_model();
    let tasks = estimated_tasks(20);
    let mut fresh = EstimationModel::new();
    let report = fresh.train(&tasks).unwrap();

    assert_eq!(report.samples, 20);
    assert_eq!(report.feature_count, 14);
    assert_eq!(model.feature_names().len(), 14);
    assert_eq!(model.feature_names()[0], "type_epic");
    assert!(report.mae >= 0.0 && report.mae.is_finite());
    assert!(report.r2_score <= 1.0);
    assert!(fresh.trained_at().is_some());
}

#[test]
fn test_same_type_estimates_one_to_ten() {
    let tasks: Vec<TaskRecord> = (1..=10)
        .map(|points| {
            TaskRecord::new(format!("s{}", points), TaskType::Story, "word ".repeat(points))
                .with_estimate(points as f64)
        })
        .collect();
    let mut model = EstimationModel::new();
    let report = model.train(&tasks).unwrap();
    assert!(model.is_trained());
    assert_eq!(report.samples, 10);

    // In-sample rows see the same context they were trained with
    let mae = tasks
        .iter()
        .map(|t| {
            let raw = model.predict(t, &tasks).unwrap().raw_prediction.unwrap();
            (t.estimate_points.unwrap() - raw).abs()
        })
        .sum::<f64>()
        / tasks.len() as f64;
    assert!((report.mae - mae).abs() < 1e-9);
}

#[test]
fn test_constant_targets_give_full_confidence() {
    let tasks: Vec<TaskRecord> = estimated_tasks(12)
        .into_iter()
        .map(|t| t.with_estimate(3.0))
        .collect();
    let mut model = EstimationModel::new();
    let report = model.train(&tasks).unwrap();
    assert_eq!(report.r2_score, 1.0);
    assert_eq!(report.mae, 0.0);

    let prediction = model.predict(&tasks[0], &tasks).unwrap();
    assert_eq!(prediction.method, EstimationMethod::Ml);
    assert_eq!(prediction.predicted_points, 3);
    assert_eq!(prediction.confidence, 1.0);
}

#[test]
fn test_ml_prediction_fields() {
    let (model, tasks) = trained_model();
    let task = TaskRecord::new("new", TaskType::Story, "build api cache").with_project("p1");

    let prediction = model.predict(&task, &tasks).unwrap();
    let raw = prediction.raw_prediction.unwrap();
    assert_eq!(prediction.method, EstimationMethod::Ml);
    assert_eq!(prediction.predicted_points, round_half_even(raw) as u32);
    assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);
    assert!((1.0..=8.0).contains(&raw));
}

#[test]
fn test_training_is_deterministic() {
    let tasks = estimated_tasks(15);
    let mut a = EstimationModel::new();
    let mut b = EstimationModel::new();
    a.train(&tasks).unwrap();
    b.train(&tasks).unwrap();

    for task in &tasks {
        assert_eq!(a.predict(task, &tasks).unwrap(), b.predict(task, &tasks).unwrap());
    }
}

#[test]
fn test_suggest_buffer_minimum() {
    let model = EstimationModel::new();
    let task = TaskRecord::new("t", TaskType::Subtask, "x").with_priority(Priority::Low);

    let recommendation = model.suggest_buffer(&task, &[]).unwrap();
    assert_eq!(recommendation.base_estimate, 1);
    assert_eq!(recommendation.buffer_points, MIN_BUFFER_POINTS);
    assert_eq!(recommendation.total_estimate, 2);
    assert!((recommendation.buffer_percentage - 16.8).abs() < 1e-9);
}

#[test]
fn test_save_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.bin");
    let (model, tasks) = trained_model();

    let info = model.save(&path).unwrap();
    assert_eq!(info.checksum.len(), 64);

    let loaded = EstimationModel::load(&path).unwrap();
    assert!(loaded.is_trained());
    assert_eq!(loaded.feature_names(), model.feature_names());
    assert_eq!(loaded.trained_at(), model.trained_at());
    for task in &tasks {
        assert_eq!(
            loaded.predict(task, &tasks).unwrap(),
            model.predict(task, &tasks).unwrap()
        );
    }
}

#[test]
fn test_untrained_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("untrained.bin");
    EstimationModel::new().save(&path).unwrap();

    let loaded = EstimationModel::load(&path).unwrap();
    assert!(!loaded.is_trained());
}

#[test]
fn test_corrupt_reload_keeps_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.bin");
    std::fs::write(&path, b"not a model").unwrap();

    let (mut model, tasks) = trained_model();
    let before = model.predict(&tasks[0], &tasks).unwrap();

    assert!(matches!(model.reload(&path), Err(EstimationError::Persistence(_))));
    assert!(model.is_trained());
    assert_eq!(model.predict(&tasks[0], &tasks).unwrap(), before);
}

#[test]
fn test_open_missing_or_corrupt_starts_untrained() {
    let dir = TempDir::new().unwrap();
    assert!(!EstimationModel::open(&dir.path().join("absent.bin")).is_trained());

    let path = dir.path().join("corrupt.bin");
    std::fs::write(&path, b"junk").unwrap();
    assert!(!EstimationModel::open(&path).is_trained());
}

#[test]
fn test_failed_retrain_keeps_previous_model() {
    let (mut model, tasks) = trained_model();
    let before = model.predict(&tasks[3], &tasks).unwrap();
    let trained_at = model.trained_at();

    assert!(model.train(&estimated_tasks(3)).is_err());
    assert!(model.is_trained());
    assert_eq!(model.trained_at(), trained_at);
    assert_eq!(model.predict(&tasks[3], &tasks).unwrap(), before);
}

#[test]
fn test_estimator_trait_object() {
    let (model, tasks) = trained_model();
    let estimators: Vec<Box<dyn Estimator>> =
        vec![Box::new(FallbackEstimator), Box::new(model)];

    let methods: Vec<EstimationMethod> = estimators
        .iter()
        .map(|e| e.estimate(&tasks[0], &tasks).unwrap().method)
        .collect();
    assert_eq!(methods, vec![EstimationMethod::RuleBased, EstimationMethod::Ml]);
}
