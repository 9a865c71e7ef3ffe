//! Error types for estimation

use thiserror::Error;

/// Estimation errors
#[derive(Debug, Error)]
pub enum EstimationError {
    /// Not enough estimated tasks to fit a model
    #[error("Need at least {required} tasks with estimates to train, found {found}")]
    InsufficientData { required: usize, found: usize },

    /// Inference features differ from the frozen training layout
    #[error("Feature mismatch: expected {expected:?}, got {got:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// Model artifact missing, unreadable or incompatible
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Task absent from the task store
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Task store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for EstimationError {
    fn from(err: rusqlite::Error) -> Self {
        EstimationError::Store(err.to_string())
    }
}

/// Result type for estimation operations
pub type Result<T> = std::result::Result<T, EstimationError>;
