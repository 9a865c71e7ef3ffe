//! Training and insight commands

use anyhow::{Context, Result};
use estimation_lib::{
    EstimationService, LearningInsights, TaskStore, TrainingOutcome, TrainingReport,
};
use tabled::Tabled;

use crate::output::{
    print_info, print_json, print_rows, print_success, print_warning, FieldRow, OutputFormat,
};

/// Row for the task type distribution table
#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Type")]
    task_type: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Share")]
    share: String,
}

/// Train on completed tasks and save the model
pub fn train<S: TaskStore>(
    service: &mut EstimationService<S>,
    project: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let report = service.train(project).context("Training failed")?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_report(&report);
            print_success(&format!(
                "Model saved to {}",
                service.model_path().display()
            ));
        }
    }

    Ok(())
}

/// Summarise completed work, retraining when there is enough of it
pub fn insights<S: TaskStore>(
    service: &mut EstimationService<S>,
    project: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let insights = service
        .learning_insights(project)
        .context("Failed to gather learning insights")?;

    match format {
        OutputFormat::Json => print_json(&insights)?,
        OutputFormat::Table => print_insights(&insights),
    }

    Ok(())
}

fn print_insights(insights: &LearningInsights) {
    if insights.is_empty() {
        print_warning("No completed tasks found");
        return;
    }

    print_rows(vec![
        FieldRow::new("Completed tasks", insights.completed_tasks.to_string()),
        FieldRow::new(
            "Average story points",
            format!("{:.1}", insights.average_points),
        ),
    ]);

    let rows: Vec<TypeRow> = insights
        .type_distribution
        .iter()
        .map(|share| TypeRow {
            task_type: share.task_type.to_string(),
            count: share.count,
            share: format!("{:.1}%", share.percentage),
        })
        .collect();
    print_rows(rows);

    match &insights.training {
        Some(TrainingOutcome::Trained(report)) => {
            print_report(report);
            print_success("Model saved and ready for predictions.");
        }
        Some(TrainingOutcome::Skipped { reason }) => print_warning(reason),
        None => print_info("Not enough completed tasks to retrain the model."),
    }
}

fn print_report(report: &TrainingReport) {
    print_rows(vec![
        FieldRow::new("Trained on", format!("{} tasks", report.samples)),
        FieldRow::new("R² score", format!("{:.3}", report.r2_score)),
        FieldRow::new("MAE", format!("{:.2} points", report.mae)),
        FieldRow::new("Features", report.feature_count.to_string()),
    ]);
}
