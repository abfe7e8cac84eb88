//! Artifact store port: Trait for persisting the encoder/classifier pair.
//!
//! The two halves of an artifact are always written and read together; a store
//! never exposes one without the other.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::EncoderSet;
use crate::ports::OutcomeClassifier;

/// Errors that can occur while persisting or loading an artifact pair.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("No artifact found: {0}")]
    NotFound(String),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact integrity check failed: {0}")]
    Integrity(String),

    #[error("Encoders and classifier do not belong together: {0}")]
    Mismatch(String),
}

/// A classifier that can be written to and restored from an artifact.
pub trait PersistedClassifier: OutcomeClassifier + Serialize + DeserializeOwned {}

impl<T> PersistedClassifier for T where T: OutcomeClassifier + Serialize + DeserializeOwned {}

/// Metadata recorded alongside each persisted artifact pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Version label of the pair (directory name for filesystem stores)
    pub version: String,

    /// Monotonic serial, one higher than the previous artifact in the store
    pub serial: u64,

    /// Write timestamp
    pub created_at: DateTime<Utc>,
}

/// Encoders, classifier and metadata read back from a store.
#[derive(Debug)]
pub struct StoredArtifact<M> {
    pub encoders: EncoderSet,
    pub model: M,
    pub info: ArtifactInfo,
}

/// Trait for artifact persistence.
pub trait ArtifactStore: Send + Sync {
    /// Persist a new artifact pair and make it the active one.
    ///
    /// All-or-nothing: on error the previously active pair stays active.
    ///
    /// # Errors
    /// Returns error if either half cannot be written.
    fn save<M: PersistedClassifier>(
        &self,
        encoders: &EncoderSet,
        model: &M,
    ) -> Result<ArtifactInfo, ArtifactError>;

    /// Load the active artifact pair.
    ///
    /// # Errors
    /// Returns `ArtifactError::NotFound` if nothing has been saved, and
    /// `ArtifactError::Integrity` if the halves fail verification.
    fn load<M: PersistedClassifier>(&self) -> Result<StoredArtifact<M>, ArtifactError>;

    /// Metadata of the active artifact pair, if any.
    ///
    /// # Errors
    /// Returns error if the store cannot be read.
    fn active(&self) -> Result<Option<ArtifactInfo>, ArtifactError>;
}
