//! Story point estimation engine

mod buffer;
mod fallback;
mod forest;
mod model;
mod scaler;

#[cfg(test)]
mod tests;

pub use buffer::{
    BufferAdvisor, BufferPolicy, COMPLEXITY_WEIGHT, CONFIDENCE_WEIGHT, MIN_BUFFER_POINTS,
};
pub use fallback::{FallbackEstimator, RULE_BASED_CONFIDENCE};
pub use forest::{ForestConfig, RandomForest, RegressionTree};
pub use model::{EstimationModel, MIN_TRAINING_SAMPLES};
pub use scaler::StandardScaler;

use crate::error::Result;
use crate::models::{Prediction, TaskRecord};

/// Trait for estimation implementations
pub trait Estimator {
    /// Predict story points for `task` given historical context
    fn estimate(&self, task: &TaskRecord, historical: &[TaskRecord]) -> Result<Prediction>;
}
