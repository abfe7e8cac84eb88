//! Domain layer: Core business types and logic.
//!
//! This module contains pure Rust types with no I/O. All persisted types are
//! serializable and validate their invariants on construction.

mod features;
mod patient;
mod prediction;
mod vocabulary;

pub use features::{FeatureColumn, FeatureDomain, FeatureSchema, FeatureVector};
pub use patient::{
    CategoricalField, Column, NumericField, PatientRecord, COLUMN_COUNT, COLUMN_ORDER,
    OUTCOME_HEADER,
};
pub use prediction::{confidence_percent, ClassPrediction, ClassProbabilities, Prediction};
pub use vocabulary::{EncoderSet, EncodingError, VocabularyMapping};

#[cfg(test)]
pub(crate) use patient::sample_record;
