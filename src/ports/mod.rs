//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the pipelines and their collaborators (classifier algorithm,
//! artifact persistence, dataset source, identity provider).

mod artifact_store;
mod classifier;
mod dataset;
mod identity;

pub use artifact_store::{ArtifactError, ArtifactInfo, ArtifactStore, PersistedClassifier, StoredArtifact};
pub use classifier::{ClassifierError, ClassifierTrainer, OutcomeClassifier, TrainingSet};
pub use dataset::{is_missing, DatasetError, DatasetRow, DatasetSource, MISSING_TOKENS};
pub use identity::{AuthError, IdentityVerifier, VerifiedIdentity};
