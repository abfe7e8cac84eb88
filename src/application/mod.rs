//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod artifact;
mod config;
mod endpoint;
mod inference;
mod training;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::{ArtifactPair, VocabularyDrift};
pub use config::{HoldoutSplit, TrainingConfig};
pub use endpoint::{bearer_token, predict_validated, EndpointError, PredictionEndpoint, PredictionRequest};
pub use inference::{InferenceError, InferenceService};
pub use training::{TrainingOutcome, TrainingReport, TrainingService};
