//! Heuristic complexity scoring
//!
//! Rates a task from 0 to 10 using its type, priority, description size and
//! technical keywords. Independent of any trained model, so it doubles as
//! the fallback estimator.

use crate::models::{Priority, TaskRecord, TaskType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound of the complexity scale
pub const MAX_COMPLEXITY: f64 = 10.0;

/// Description length (chars) above which the large bonus applies
const LONG_DESCRIPTION_CHARS: usize = 500;

/// Description length (chars) above which the medium bonus applies
const MEDIUM_DESCRIPTION_CHARS: usize = 200;

const LONG_DESCRIPTION_BONUS: f64 = 1.5;
const MEDIUM_DESCRIPTION_BONUS: f64 = 1.0;

/// Bonus per distinct technical keyword matched
const KEYWORD_BONUS: f64 = 0.5;

static TECH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        "api",
        "database",
        "integration",
        "refactor",
        "migration",
        "security",
    ]
    .iter()
    .map(|kw| Regex::new(&format!(r"\b{}\b", kw)).expect("Valid keyword regex"))
    .collect()
});

/// Base score for a task type
pub fn type_base_score(task_type: TaskType) -> f64 {
    match task_type {
        TaskType::Epic => 8.0,
        TaskType::Story => 5.0,
        TaskType::Task => 3.0,
        TaskType::Bug => 2.0,
        TaskType::Subtask => 1.0,
    }
}

/// Multiplier applied to the base score
pub fn priority_multiplier(priority: Priority) -> f64 {
    match priority {
        Priority::Critical => 1.3,
        Priority::High => 1.2,
        Priority::Medium => 1.0,
        Priority::Low => 0.9,
    }
}

/// Score a task's complexity on a 0-10 scale
pub fn complexity_score(task: &TaskRecord) -> f64 {
    let mut score = type_base_score(task.task_type) * priority_multiplier(task.priority);

    score += description_bonus(task.description_text());

    let text = task.combined_text();
    let matched = TECH_PATTERNS.iter().filter(|re| re.is_match(&text)).count();
    score += matched as f64 * KEYWORD_BONUS;

    score.min(MAX_COMPLEXITY)
}

fn description_bonus(description: &str) -> f64 {
    let len = description.chars().count();
    if len > LONG_DESCRIPTION_CHARS {
        LONG_DESCRIPTION_BONUS
    } else if len > MEDIUM_DESCRIPTION_CHARS {
        MEDIUM_DESCRIPTION_BONUS
    } else {
        0.0
    }
}
