//! Inference service: Predicts treatment outcomes from a frozen artifact pair.
//!
//! Each prediction:
//! 1. Encodes the categorical fields through the fitted vocabularies
//! 2. Runs the classifier on the feature vector
//! 3. Decodes the winning class through the outcome vocabulary
//! 4. Reports the winning probability as a percentage
//!
//! The pair is shared behind an `Arc` and never mutated, so one service can
//! be cloned into as many request handlers as needed.

use std::sync::Arc;

use rayon::prelude::*;

use crate::application::ArtifactPair;
use crate::domain::{EncodingError, PatientRecord, Prediction};
use crate::ports::{ArtifactError, ArtifactStore, ClassifierError, OutcomeClassifier, PersistedClassifier};

/// Errors that can occur while predicting one record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("Encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Classification failed: {0}")]
    Classifier(#[from] ClassifierError),
}

impl InferenceError {
    /// True if the record used a category the artifact was not fitted on.
    #[must_use]
    pub fn is_unknown_category(&self) -> bool {
        matches!(self, Self::Encoding(EncodingError::UnknownCategory { .. }))
    }
}

/// Service for running outcome predictions.
#[derive(Debug)]
pub struct InferenceService<M> {
    artifacts: Arc<ArtifactPair<M>>,
}

impl<M> Clone for InferenceService<M> {
    fn clone(&self) -> Self {
        Self {
            artifacts: Arc::clone(&self.artifacts),
        }
    }
}

impl<M: PersistedClassifier> InferenceService<M> {
    /// Load the active artifact pair from a store.
    ///
    /// # Errors
    /// Returns error if the store has no artifact, its files fail verification,
    /// or the encoders and classifier do not belong together.
    pub fn from_store<S: ArtifactStore>(store: &S) -> Result<Self, ArtifactError> {
        let pair = ArtifactPair::from_stored(store.load::<M>()?)?;
        tracing::info!(
            "Inference service ready: {} vocabularies, {} outcome classes",
            pair.encoders().len(),
            pair.model().n_classes()
        );
        Ok(Self::new(Arc::new(pair)))
    }
}

impl<M: OutcomeClassifier> InferenceService<M> {
    /// Create a service over an already verified pair.
    pub fn new(artifacts: Arc<ArtifactPair<M>>) -> Self {
        for drift in artifacts.vocabulary_drift() {
            tracing::warn!(
                "Vocabulary drift: '{}' accepts {} value(s) unknown to the artifact: {}",
                drift.field.header(),
                drift.unknown.len(),
                drift.unknown.join(", ")
            );
        }
        Self { artifacts }
    }

    #[must_use]
    pub fn artifacts(&self) -> &Arc<ArtifactPair<M>> {
        &self.artifacts
    }

    /// Predict the outcome of one validated record.
    ///
    /// Numeric domains are assumed checked by the caller; the classifier still
    /// rejects malformed vectors.
    ///
    /// # Errors
    /// Returns `InferenceError::Encoding` for a category unknown to the
    /// vocabularies and `InferenceError::Classifier` for a rejected vector.
    pub fn predict(&self, record: &PatientRecord) -> Result<Prediction, InferenceError> {
        let encoders = self.artifacts.encoders();

        let x = encoders.encode_record(record)?;
        let raw = self.artifacts.model().predict(&x)?;
        let label = encoders.decode_outcome(raw.class_code)?;
        let prediction = Prediction::new(label, raw.top_probability());

        tracing::debug!(
            "Predicted class {} with confidence {:.2}%",
            raw.class_code,
            prediction.confidence
        );
        Ok(prediction)
    }

    /// Predict a batch of records in parallel.
    ///
    /// Results are in input order; one failing record does not affect the others.
    #[must_use]
    pub fn predict_batch(&self, records: &[PatientRecord]) -> Vec<Result<Prediction, InferenceError>> {
        let results: Vec<_> = records.par_iter().map(|r| self.predict(r)).collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            "Batch inference complete: {} records, {} failed",
            records.len(),
            failed
        );
        results
    }
}
