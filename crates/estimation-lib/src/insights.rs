//! Learning insights over completed tasks

use crate::models::{TaskRecord, TaskType, TrainingReport};
use serde::Serialize;

/// Completed tasks needed before insights also attempt a training run
pub const INSIGHTS_TRAINING_THRESHOLD: usize = 10;

/// Share of one task type among completed tasks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeShare {
    pub task_type: TaskType,
    pub count: usize,
    /// Percentage of completed tasks, 0-100
    pub percentage: f64,
}

/// Result of the training attempt made while gathering insights
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainingOutcome {
    Trained(TrainingReport),
    Skipped { reason: String },
}

/// Summary of completed work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningInsights {
    pub completed_tasks: usize,
    /// Mean estimate; tasks without one count as zero
    pub average_points: f64,
    /// Most common type first
    pub type_distribution: Vec<TypeShare>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingOutcome>,
}

impl LearningInsights {
    /// Summarise `tasks` without any training outcome
    pub fn from_tasks(tasks: &[TaskRecord]) -> Self {
        let total = tasks.len();
        let average_points = if total == 0 {
            0.0
        } else {
            tasks
                .iter()
                .map(|t| t.estimate_points.filter(|p| p.is_finite()).unwrap_or(0.0))
                .sum::<f64>()
                / total as f64
        };

        // First-seen order breaks ties
        let mut counts: Vec<(TaskType, usize)> = Vec::new();
        for task in tasks {
            match counts.iter_mut().find(|(t, _)| *t == task.task_type) {
                Some((_, count)) => *count += 1,
                None => counts.push((task.task_type, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let type_distribution = counts
            .into_iter()
            .map(|(task_type, count)| TypeShare {
                task_type,
                count,
                percentage: count as f64 / total as f64 * 100.0,
            })
            .collect();

        Self {
            completed_tasks: total,
            average_points,
            type_distribution,
            training: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.completed_tasks == 0
    }

    pub fn with_training(mut self, outcome: TrainingOutcome) -> Self {
        self.training = Some(outcome);
        self
    }
}
