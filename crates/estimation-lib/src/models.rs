//! Core data models for task estimation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of work item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum TaskType {
    Epic,
    Story,
    #[default]
    Task,
    Bug,
    Subtask,
}

impl TaskType {
    /// Every task type, in feature encoding order
    pub const ALL: [TaskType; 5] = [
        TaskType::Epic,
        TaskType::Story,
        TaskType::Task,
        TaskType::Bug,
        TaskType::Subtask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Epic => "epic",
            TaskType::Story => "story",
            TaskType::Task => "task",
            TaskType::Bug => "bug",
            TaskType::Subtask => "subtask",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(TaskType::Epic),
            "story" => Ok(TaskType::Story),
            "task" => Ok(TaskType::Task),
            "bug" => Ok(TaskType::Bug),
            "subtask" => Ok(TaskType::Subtask),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

/// Missing or unrecognised values fall back to `task`
impl From<Option<String>> for TaskType {
    fn from(value: Option<String>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Ordinal level used as a model feature (critical = 4 .. low = 1)
    pub fn level(&self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Missing or unrecognised values fall back to `medium`
impl From<Option<String>> for Priority {
    fn from(value: Option<String>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as stored by the project-management system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Ground-truth story points, when the task has been estimated
    #[serde(default)]
    pub estimate_points: Option<f64>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, task_type: TaskType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_estimate(mut self, points: f64) -> Self {
        self.estimate_points = Some(points);
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// The estimate, if it is usable as a training target
    pub fn valid_estimate(&self) -> Option<f64> {
        self.estimate_points.filter(|p| p.is_finite() && *p > 0.0)
    }

    /// Description text, treating an absent description as empty
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Lowercased title and description joined by a space
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.description_text()).to_lowercase()
    }
}

/// How a prediction was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimationMethod {
    #[serde(rename = "rule-based")]
    RuleBased,
    #[serde(rename = "ml")]
    Ml,
}

impl EstimationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimationMethod::RuleBased => "rule-based",
            EstimationMethod::Ml => "ml",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Story point prediction for a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_points: u32,
    pub confidence: f64,
    pub method: EstimationMethod,
    pub complexity_score: f64,
    /// Unrounded ensemble mean, only present for `ml` predictions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_prediction: Option<f64>,
}

/// Risk-adjusted estimate derived from a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferRecommendation {
    pub base_estimate: u32,
    pub buffer_points: u32,
    pub total_estimate: u32,
    /// Buffer as a percentage of the base estimate, one decimal place
    pub buffer_percentage: f64,
    pub confidence: f64,
    pub complexity: f64,
}

/// In-sample diagnostics from a successful training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub r2_score: f64,
    pub mae: f64,
    pub feature_count: usize,
    pub trained_at: i64,
}

/// Round half to even, the convention used for every reported integer
pub fn round_half_even(value: f64) -> f64 {
    let rounded = value.round();
    if (value - value.trunc()).abs() == 0.5 {
        2.0 * (value / 2.0).round()
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_defaults_to_task() {
        assert_eq!(TaskType::from(None), TaskType::Task);
        assert_eq!(TaskType::from(Some("feature".to_string())), TaskType::Task);
        assert_eq!(TaskType::from(Some("Bug".to_string())), TaskType::Bug);
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(Priority::Critical.level(), 4);
        assert_eq!(Priority::High.level(), 3);
        assert_eq!(Priority::Medium.level(), 2);
        assert_eq!(Priority::Low.level(), 1);
        assert_eq!(Priority::from(Some("urgent".to_string())), Priority::Medium);
    }

    #[test]
    fn test_task_record_deserialize_lenient() {
        let json = r#"{"id": "t1", "type": null, "priority": "whatever", "title": "Fix"}"#;
        let task: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(task.task_type, TaskType::Task);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.description.is_none());
        assert!(task.estimate_points.is_none());

        let json = r#"{"id": "t2", "title": "Epic thing", "type": "epic", "estimate_points": 8}"#;
        let task: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(task.task_type, TaskType::Epic);
        assert_eq!(task.valid_estimate(), Some(8.0));
    }

    #[test]
    fn test_valid_estimate_rejects_non_positive() {
        let task = TaskRecord::new("t", TaskType::Task, "x");
        assert_eq!(task.valid_estimate(), None);
        assert_eq!(task.clone().with_estimate(0.0).valid_estimate(), None);
        assert_eq!(task.clone().with_estimate(-2.0).valid_estimate(), None);
        assert_eq!(task.with_estimate(5.0).valid_estimate(), Some(5.0));
    }

    #[test]
    fn test_method_serializes_as_label() {
        let json = serde_json::to_string(&EstimationMethod::RuleBased).unwrap();
        assert_eq!(json, "\"rule-based\"");
        let json = serde_json::to_string(&EstimationMethod::Ml).unwrap();
        assert_eq!(json, "\"ml\"");
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(1.8), 2.0);
        assert_eq!(round_half_even(2.5), 2.0);
        assert_eq!(round_half_even(3.5), 4.0);
        assert_eq!(round_half_even(0.5), 0.0);
        assert_eq!(round_half_even(2.4), 2.0);
    }
}
