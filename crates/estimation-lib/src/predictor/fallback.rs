//! Rule-based estimation used before any model has been trained

use super::Estimator;
use crate::complexity::complexity_score;
use crate::error::Result;
use crate::models::{round_half_even, EstimationMethod, Prediction, TaskRecord};

/// Fixed confidence reported for heuristic estimates
pub const RULE_BASED_CONFIDENCE: f64 = 0.5;

/// Fallback estimator that maps the complexity score straight to points
pub struct FallbackEstimator;

impl FallbackEstimator {
    /// Rounded complexity score as story points, with a fixed confidence
    pub fn predict(task: &TaskRecord) -> Prediction {
        let complexity = complexity_score(task);
        Prediction {
            predicted_points: round_half_even(complexity) as u32,
            confidence: RULE_BASED_CONFIDENCE,
            method: EstimationMethod::RuleBased,
            complexity_score: complexity,
            raw_prediction: None,
        }
    }
}

impl Estimator for FallbackEstimator {
    fn estimate(&self, task: &TaskRecord, _historical: &[TaskRecord]) -> Result<Prediction> {
        Ok(Self::predict(task))
    }
}
