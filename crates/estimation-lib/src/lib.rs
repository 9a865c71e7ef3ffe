//! Story point estimation library
//!
//! This crate provides the core functionality for:
//! - Feature extraction from task records
//! - Rule-based complexity scoring
//! - A trainable regression-forest estimator with rule-based fallback
//! - Schedule buffer recommendations
//! - Model persistence and learning insights

pub mod complexity;
pub mod config;
pub mod error;
pub mod features;
pub mod insights;
pub mod models;
pub mod observability;
pub mod persistence;
pub mod predictor;
pub mod service;
pub mod store;

pub use complexity::complexity_score;
pub use config::EstimatorConfig;
pub use error::{EstimationError, Result};
pub use features::{extract_features, FeatureExtractor, FeatureVector};
pub use insights::{LearningInsights, TrainingOutcome, TypeShare};
pub use models::*;
pub use observability::{EstimatorMetrics, StructuredLogger};
pub use predictor::{BufferAdvisor, BufferPolicy, EstimationModel, Estimator, ForestConfig};
pub use service::EstimationService;
pub use store::{InMemoryTaskStore, SqliteTaskStore, TaskQuery, TaskStore};
