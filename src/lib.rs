//! # Mentis
//!
//! Treatment outcome prediction for mental-health patient records.
//!
//! This crate provides:
//! - Frozen vocabulary encoders for the categorical attributes
//! - A seeded random forest classifier
//! - A training pipeline that persists encoders and classifier as one artifact
//! - An inference pipeline returning the predicted outcome and its confidence
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (patient records, vocabularies, predictions)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (random forest, artifact directories, CSV)
//! - `application`: Use cases orchestrating domain and ports

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub use application::{InferenceService, TrainingConfig, TrainingOutcome, TrainingService};
pub use domain::{PatientRecord, Prediction};

/// Result type for Mentis operations
pub type Result<T> = std::result::Result<T, MentisError>;

/// Main error type for Mentis
#[derive(Debug, thiserror::Error)]
pub enum MentisError {
    #[error("Encoding failed: {0}")]
    Encoding(#[from] domain::EncodingError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ports::ClassifierError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] ports::DatasetError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ports::ArtifactError),

    #[error("Inference failed: {0}")]
    Inference(#[from] application::InferenceError),

    #[error("Invalid patient data: {0}")]
    Validation(String),
}
