//! Feature extraction for estimation
//!
//! Turns a task record plus historical context into a fixed-order vector of
//! named numeric features. Features include a one-hot task type, priority
//! level, title/description size statistics, a technical keyword count, the
//! historical average for the task's type, and a subtask flag.

use crate::models::{TaskRecord, TaskType};
use serde::{Deserialize, Serialize};

/// Historical average used when no comparable estimated task exists
pub const DEFAULT_HISTORICAL_POINTS: f64 = 3.0;

/// Vocabulary whose occurrences hint at technical complexity
pub const TECH_KEYWORDS: [&str; 9] = [
    "api",
    "database",
    "integration",
    "refactor",
    "migration",
    "security",
    "performance",
    "optimization",
    "algorithm",
];

/// Ordered mapping from feature name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.names.push(name.into());
        self.values.push(value);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Extracts model features from task records
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    default_historical_points: f64,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            default_historical_points: DEFAULT_HISTORICAL_POINTS,
        }
    }

    pub fn with_default_points(default_historical_points: f64) -> Self {
        Self {
            default_historical_points,
        }
    }

    /// Build the feature vector for `task`. Never fails: absent optional
    /// fields contribute their documented defaults.
    pub fn extract(&self, task: &TaskRecord, historical: &[TaskRecord]) -> FeatureVector {
        let mut features = FeatureVector::new();

        for t in TaskType::ALL {
            let hot = if task.task_type == t { 1.0 } else { 0.0 };
            features.push(format!("type_{}", t.as_str()), hot);
        }

        features.push("priority", task.priority.level() as f64);

        features.push("title_length", task.title.chars().count() as f64);
        features.push("title_words", word_count(&task.title) as f64);

        let description = task.description_text();
        let has_description = !description.is_empty();
        features.push("has_description", if has_description { 1.0 } else { 0.0 });
        features.push("description_length", description.chars().count() as f64);
        features.push("description_words", word_count(description) as f64);

        features.push(
            "tech_keywords_count",
            tech_keyword_count(&task.combined_text()) as f64,
        );

        features.push(
            "historical_avg_points",
            self.historical_average(task.task_type, historical),
        );

        features.push(
            "is_subtask",
            if task.parent_id.is_some() { 1.0 } else { 0.0 },
        );

        features
    }

    /// Mean estimate over historical tasks of the same type that carry one
    fn historical_average(&self, task_type: TaskType, historical: &[TaskRecord]) -> f64 {
        let estimates: Vec<f64> = historical
            .iter()
            .filter(|t| t.task_type == task_type)
            .filter_map(TaskRecord::valid_estimate)
            .collect();

        if estimates.is_empty() {
            return self.default_historical_points;
        }
        estimates.iter().sum::<f64>() / estimates.len() as f64
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract features with the default extractor
pub fn extract_features(task: &TaskRecord, historical: &[TaskRecord]) -> FeatureVector {
    FeatureExtractor::new().extract(task, historical)
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Number of distinct vocabulary keywords appearing anywhere in `text`
fn tech_keyword_count(text: &str) -> usize {
    TECH_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn history(task_type: TaskType, points: &[Option<f64>]) -> Vec<TaskRecord> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| TaskRecord {
                id: format!("h{}", i),
                task_type,
                title: "historical".to_string(),
                estimate_points: *p,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_feature_names_are_fixed() {
        let task = TaskRecord::new("t1", TaskType::Bug, "Fix login");
        let f = extract_features(&task, &[]);
        let names: Vec<&str> = f.names().iter().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "type_epic",
                "type_story",
                "type_task",
                "type_bug",
                "type_subtask",
                "priority",
                "title_length",
                "title_words",
                "has_description",
                "description_length",
                "description_words",
                "tech_keywords_count",
                "historical_avg_points",
                "is_subtask",
            ]
        );
    }

    #[test]
    fn test_one_hot_type() {
        let task = TaskRecord::new("t1", TaskType::Story, "Add page");
        let f = extract_features(&task, &[]);
        assert_eq!(f.get("type_story"), Some(1.0));
        assert_eq!(f.get("type_task"), Some(0.0));
        let hot: f64 = TaskType::ALL
            .iter()
            .filter_map(|t| f.get(&format!("type_{}", t.as_str())))
            .sum();
        assert_eq!(hot, 1.0);
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let task = TaskRecord {
            id: "t1".to_string(),
            ..Default::default()
        };
        let f = extract_features(&task, &[]);
        assert_eq!(f.get("type_task"), Some(1.0));
        assert_eq!(f.get("priority"), Some(2.0));
        assert_eq!(f.get("title_length"), Some(0.0));
        assert_eq!(f.get("has_description"), Some(0.0));
        assert_eq!(f.get("description_length"), Some(0.0));
        assert_eq!(f.get("description_words"), Some(0.0));
        assert_eq!(f.get("historical_avg_points"), Some(DEFAULT_HISTORICAL_POINTS));
        assert_eq!(f.get("is_subtask"), Some(0.0));
    }

    #[test]
    fn test_text_statistics() {
        let task = TaskRecord::new("t1", TaskType::Task, "Refactor the API layer")
            .with_priority(Priority::Critical)
            .with_description("Improve database performance");
        let f = extract_features(&task, &[]);
        assert_eq!(f.get("priority"), Some(4.0));
        assert_eq!(f.get("title_length"), Some(22.0));
        assert_eq!(f.get("title_words"), Some(4.0));
        assert_eq!(f.get("has_description"), Some(1.0));
        assert_eq!(f.get("description_length"), Some(28.0));
        assert_eq!(f.get("description_words"), Some(3.0));
        // refactor, api, database, performance
        assert_eq!(f.get("tech_keywords_count"), Some(4.0));
    }

    #[test]
    fn test_keywords_match_as_substrings() {
        // "apis" contains "api", "optimizations" contains "optimization"
        let task = TaskRecord::new("t1", TaskType::Task, "APIs and optimizations");
        let f = extract_features(&task, &[]);
        assert_eq!(f.get("tech_keywords_count"), Some(2.0));
    }

    #[test]
    fn test_historical_average_same_type_only() {
        let mut hist = history(TaskType::Bug, &[Some(2.0), Some(4.0)]);
        hist.extend(history(TaskType::Epic, &[Some(20.0)]));
        let task = TaskRecord::new("t1", TaskType::Bug, "Crash");
        let f = extract_features(&task, &hist);
        assert_eq!(f.get("historical_avg_points"), Some(3.0));

        let task = TaskRecord::new("t2", TaskType::Epic, "Platform");
        let f = extract_features(&task, &hist);
        assert_eq!(f.get("historical_avg_points"), Some(20.0));
    }

    #[test]
    fn test_historical_average_ignores_unestimated() {
        let hist = history(TaskType::Story, &[Some(5.0), None, Some(0.0), Some(3.0)]);
        let task = TaskRecord::new("t1", TaskType::Story, "Checkout");
        let f = extract_features(&task, &hist);
        assert_eq!(f.get("historical_avg_points"), Some(4.0));
    }

    #[test]
    fn test_historical_average_defaults_without_matches() {
        let hist = history(TaskType::Story, &[None, None]);
        let task = TaskRecord::new("t1", TaskType::Story, "Checkout");
        let f = extract_features(&task, &hist);
        assert_eq!(f.get("historical_avg_points"), Some(DEFAULT_HISTORICAL_POINTS));

        let extractor = FeatureExtractor::with_default_points(5.0);
        let task = TaskRecord::new("t2", TaskType::Subtask, "Wire up");
        let f = extractor.extract(&task, &hist);
        assert_eq!(f.get("historical_avg_points"), Some(5.0));
    }

    #[test]
    fn test_subtask_flag_follows_parent() {
        let task = TaskRecord::new("t1", TaskType::Task, "Child").with_parent("p1");
        assert_eq!(extract_features(&task, &[]).get("is_subtask"), Some(1.0));
    }

    #[test]
    fn test_names_independent_of_context() {
        let hist = history(TaskType::Epic, &[Some(8.0)]);
        let a = extract_features(&TaskRecord::new("a", TaskType::Bug, "x"), &[]);
        let b = extract_features(&TaskRecord::new("b", TaskType::Epic, "y z"), &hist);
        assert_eq!(a.names(), b.names());
        assert_eq!(a.len(), 14);
    }
}
