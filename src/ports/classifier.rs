//! Classifier port: Trait for the outcome classification strategy.
//!
//! This trait abstracts the ensemble algorithm from the training and inference
//! pipelines, so both can run against a deterministic stub.

use crate::domain::{ClassPrediction, FeatureSchema, FeatureVector};

/// Errors that can occur while fitting or querying a classifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("Invalid feature vector: {0}")]
    InvalidFeatureVector(String),

    #[error("Classifier fit failed: {0}")]
    Fit(String),
}

/// Encoded training data for a classifier.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    /// Feature vectors, one per row
    pub features: Vec<FeatureVector>,

    /// Encoded outcome code for each row
    pub labels: Vec<u32>,

    /// Domains of the feature columns
    pub schema: FeatureSchema,

    /// Cardinality of the outcome vocabulary
    pub n_classes: u32,
}

impl TrainingSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of distinct outcome codes present in the labels.
    #[must_use]
    pub fn distinct_labels(&self) -> usize {
        let mut seen = vec![false; self.n_classes as usize];
        for &label in &self.labels {
            if let Some(slot) = seen.get_mut(label as usize) {
                *slot = true;
            }
        }
        seen.into_iter().filter(|&s| s).count()
    }

    /// Check shape invariants shared by every trainer.
    ///
    /// # Errors
    /// Returns `ClassifierError::Fit` if the set is empty, lengths disagree, a
    /// label is out of range, a vector violates the schema, or fewer than two
    /// distinct classes are present.
    pub fn check(&self) -> Result<(), ClassifierError> {
        if self.is_empty() {
            return Err(ClassifierError::Fit("no training rows".into()));
        }
        if self.features.len() != self.labels.len() {
            return Err(ClassifierError::Fit(format!(
                "{} feature vectors but {} labels",
                self.features.len(),
                self.labels.len()
            )));
        }
        if let Some(bad) = self.labels.iter().find(|&&l| l >= self.n_classes) {
            return Err(ClassifierError::Fit(format!(
                "label {bad} outside 0..{}",
                self.n_classes
            )));
        }
        for (row, x) in self.features.iter().enumerate() {
            self.schema
                .check(x)
                .map_err(|e| ClassifierError::Fit(format!("row {row}: {e}")))?;
        }
        let distinct = self.distinct_labels();
        if distinct < 2 {
            return Err(ClassifierError::Fit(format!(
                "need at least 2 distinct outcome classes, found {distinct}"
            )));
        }
        Ok(())
    }
}

/// A fitted classifier mapping feature vectors to outcome class distributions.
///
/// Implementations are immutable after fitting and shared across threads.
pub trait OutcomeClassifier: Send + Sync {
    /// Predict the outcome distribution for one feature vector.
    ///
    /// The returned probabilities sum to 1 and the winning class is the most
    /// probable one, ties resolved to the lowest code.
    ///
    /// # Errors
    /// Returns `ClassifierError::InvalidFeatureVector` if `x` does not match
    /// [`schema`](Self::schema).
    fn predict(&self, x: &FeatureVector) -> Result<ClassPrediction, ClassifierError>;

    /// Feature columns the classifier was fitted against.
    fn schema(&self) -> &FeatureSchema;

    /// Number of outcome classes the classifier distributes probability over.
    fn n_classes(&self) -> u32;
}

/// Strategy that fits an [`OutcomeClassifier`].
pub trait ClassifierTrainer {
    type Model: OutcomeClassifier;

    /// Fit a classifier on encoded training data.
    ///
    /// # Errors
    /// Returns `ClassifierError::Fit` if the data cannot produce a classifier.
    fn train(&self, data: &TrainingSet) -> Result<Self::Model, ClassifierError>;
}
