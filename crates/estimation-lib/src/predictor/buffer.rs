//! Schedule buffer recommendations
//!
//! Converts a prediction into a risk-adjusted estimate. Lower confidence and
//! higher complexity both widen the buffer; the buffer is never below one
//! point.

use super::Estimator;
use crate::error::Result;
use crate::models::{round_half_even, BufferRecommendation, EstimationMethod, Prediction, TaskRecord};

/// Share of the estimate added at zero confidence
pub const CONFIDENCE_WEIGHT: f64 = 0.3;

/// Share of the estimate added at maximum complexity
pub const COMPLEXITY_WEIGHT: f64 = 0.2;

/// Smallest buffer ever recommended, in points
pub const MIN_BUFFER_POINTS: u32 = 1;

/// Buffer policy
#[derive(Debug, Clone)]
pub struct BufferPolicy {
    pub confidence_weight: f64,
    pub complexity_weight: f64,
    pub min_buffer_points: u32,
    /// Predictions below this confidence are flagged to the caller
    pub low_confidence_threshold: f64,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            confidence_weight: CONFIDENCE_WEIGHT,
            complexity_weight: COMPLEXITY_WEIGHT,
            min_buffer_points: MIN_BUFFER_POINTS,
            low_confidence_threshold: 0.7,
        }
    }
}

/// Derives buffer recommendations from predictions
#[derive(Debug, Clone, Default)]
pub struct BufferAdvisor {
    policy: BufferPolicy,
}

impl BufferAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: BufferPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BufferPolicy {
        &self.policy
    }

    /// Fraction of the base estimate to add as buffer
    pub fn buffer_fraction(&self, confidence: f64, complexity: f64) -> f64 {
        let confidence_factor = (1.0 - confidence) * self.policy.confidence_weight;
        let complexity_factor = (complexity / 10.0) * self.policy.complexity_weight;
        confidence_factor + complexity_factor
    }

    /// Build a recommendation from an existing prediction
    pub fn recommend(&self, prediction: &Prediction) -> BufferRecommendation {
        let base = prediction.predicted_points;
        let fraction = self.buffer_fraction(prediction.confidence, prediction.complexity_score);

        let raw_buffer = round_half_even(base as f64 * fraction).max(0.0) as u32;
        let buffer_points = raw_buffer.max(self.policy.min_buffer_points);

        BufferRecommendation {
            base_estimate: base,
            buffer_points,
            total_estimate: base + buffer_points,
            buffer_percentage: round_half_even(fraction * 1000.0) / 10.0,
            confidence: prediction.confidence,
            complexity: prediction.complexity_score,
        }
    }

    /// Predict with `estimator`, then recommend a buffer for the result
    pub fn suggest<E: Estimator + ?Sized>(
        &self,
        estimator: &E,
        task: &TaskRecord,
        historical: &[TaskRecord],
    ) -> Result<BufferRecommendation> {
        let prediction = estimator.estimate(task, historical)?;
        Ok(self.recommend(&prediction))
    }

    pub fn is_low_confidence(&self, prediction: &Prediction) -> bool {
        prediction.confidence < self.policy.low_confidence_threshold
    }

    /// Reason to show next to a low-confidence prediction, if any
    pub fn low_confidence_reason(&self, prediction: &Prediction) -> Option<String> {
        if prediction.method == EstimationMethod::RuleBased {
            Some("Rule-based estimate: not enough estimated tasks to train the model".to_string())
        } else if prediction.confidence < 0.5 {
            Some("Ensemble members disagree strongly on this task".to_string())
        } else if self.is_low_confidence(prediction) {
            Some("Moderate disagreement between ensemble members".to_string())
        } else {
            None
        }
    }
}
