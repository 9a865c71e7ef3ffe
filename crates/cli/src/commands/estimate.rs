//! Prediction and buffer commands

use anyhow::{Context, Result};
use estimation_lib::predictor::FallbackEstimator;
use estimation_lib::{
    BufferRecommendation, EstimationMethod, EstimationService, Prediction, Priority, TaskRecord,
    TaskStore, TaskType,
};
use serde::Serialize;

use crate::output::{
    color_confidence, color_method, format_complexity, print_info, print_json, print_rows,
    print_warning, FieldRow, OutputFormat,
};

const RULE_BASED_NOTE: &str =
    "Rule-based estimate. Run `pm-estimate train` once 10 or more tasks have estimates.";

#[derive(Serialize)]
struct PredictionReport<'a> {
    task_id: &'a str,
    #[serde(flatten)]
    prediction: &'a Prediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Serialize)]
struct BufferReport<'a> {
    task_id: &'a str,
    #[serde(flatten)]
    recommendation: &'a BufferRecommendation,
}

/// Predict story points for a stored task
pub fn predict<S: TaskStore>(
    service: &EstimationService<S>,
    task_id: &str,
    task_type: Option<TaskType>,
    format: OutputFormat,
) -> Result<()> {
    let prediction = service
        .predict_task(task_id, task_type)
        .with_context(|| format!("Failed to predict task {}", task_id))?;
    let note = prediction_note(service, &prediction);
    render_prediction(task_id, &prediction, note, format)
}

/// Suggest a schedule buffer for a stored task
pub fn buffer<S: TaskStore>(
    service: &EstimationService<S>,
    task_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let recommendation = service
        .suggest_buffer(task_id)
        .with_context(|| format!("Failed to suggest buffer for task {}", task_id))?;

    match format {
        OutputFormat::Json => print_json(&BufferReport {
            task_id,
            recommendation: &recommendation,
        })?,
        OutputFormat::Table => {
            print_rows(vec![
                FieldRow::new("Task", task_id),
                FieldRow::new(
                    "Base estimate",
                    format!("{} points", recommendation.base_estimate),
                ),
                FieldRow::new(
                    "Buffer",
                    format!(
                        "{} points ({}%)",
                        recommendation.buffer_points, recommendation.buffer_percentage
                    ),
                ),
                FieldRow::new(
                    "Total estimate",
                    format!("{} points", recommendation.total_estimate),
                ),
                FieldRow::new("Confidence", color_confidence(recommendation.confidence)),
                FieldRow::new("Complexity", format_complexity(recommendation.complexity)),
            ]);
            print_info(&format!(
                "Plan for {} points to account for uncertainty.",
                recommendation.total_estimate
            ));
        }
    }

    Ok(())
}

/// Score an ad-hoc task with the complexity heuristic
pub fn score(
    task_type: TaskType,
    priority: Priority,
    title: String,
    description: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut task = TaskRecord::new("adhoc", task_type, title).with_priority(priority);
    task.description = description;

    let prediction = FallbackEstimator::predict(&task);
    render_prediction(&task.id, &prediction, Some(RULE_BASED_NOTE.to_string()), format)
}

fn prediction_note<S: TaskStore>(
    service: &EstimationService<S>,
    prediction: &Prediction,
) -> Option<String> {
    match prediction.method {
        EstimationMethod::RuleBased => Some(RULE_BASED_NOTE.to_string()),
        EstimationMethod::Ml => service.model().advisor().low_confidence_reason(prediction),
    }
}

fn render_prediction(
    task_id: &str,
    prediction: &Prediction,
    note: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&PredictionReport {
            task_id,
            prediction,
            note,
        })?,
        OutputFormat::Table => {
            print_rows(vec![
                FieldRow::new("Task", task_id),
                FieldRow::new(
                    "Predicted points",
                    prediction.predicted_points.to_string(),
                ),
                FieldRow::new("Confidence", color_confidence(prediction.confidence)),
                FieldRow::new("Method", color_method(prediction.method.as_str())),
                FieldRow::new("Complexity", format_complexity(prediction.complexity_score)),
            ]);
            match (prediction.method, note) {
                (EstimationMethod::RuleBased, Some(note)) => print_info(&note),
                (EstimationMethod::Ml, Some(note)) => print_warning(&note),
                (_, None) => {}
            }
        }
    }

    Ok(())
}
