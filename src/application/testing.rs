//! Deterministic collaborators for pipeline tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::{
    CategoricalField, ClassPrediction, ClassProbabilities, EncoderSet, FeatureSchema,
    FeatureVector, VocabularyMapping, COLUMN_COUNT,
};
use crate::ports::{
    ArtifactError, ArtifactInfo, ArtifactStore, ClassifierError, DatasetRow, OutcomeClassifier,
    PersistedClassifier, StoredArtifact,
};

/// Classifier that returns the same distribution for every valid vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubClassifier {
    schema: FeatureSchema,
    probabilities: Vec<f64>,
}

impl StubClassifier {
    pub fn for_encoders(encoders: &EncoderSet, probabilities: Vec<f64>) -> Self {
        Self {
            schema: FeatureSchema::for_encoders(encoders).expect("Complete encoder set"),
            probabilities,
        }
    }
}

impl OutcomeClassifier for StubClassifier {
    fn predict(&self, x: &FeatureVector) -> Result<ClassPrediction, ClassifierError> {
        self.schema
            .check(x)
            .map_err(ClassifierError::InvalidFeatureVector)?;
        ClassPrediction::from_probabilities(ClassProbabilities::new(self.probabilities.clone()))
            .ok_or_else(|| ClassifierError::InvalidFeatureVector("empty distribution".into()))
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn n_classes(&self) -> u32 {
        self.probabilities.len() as u32
    }
}

fn mapping(field: &str, categories: &[&str]) -> VocabularyMapping {
    VocabularyMapping::from_categories(field, categories.iter().map(|c| c.to_string()).collect())
        .expect("Valid vocabulary")
}

/// Encoders with outcome vocabulary `{Improved: 0, Stable: 1, Declined: 2}`.
///
/// Gender lacks `Other`, so the set drifts from the boundary on that field.
pub fn stub_encoders() -> EncoderSet {
    EncoderSet::from_mappings([
        mapping(CategoricalField::Gender.header(), &["Female", "Male"]),
        mapping(
            CategoricalField::Diagnosis.header(),
            CategoricalField::Diagnosis.allowed_values(),
        ),
        mapping(
            CategoricalField::Medication.header(),
            CategoricalField::Medication.allowed_values(),
        ),
        mapping(
            CategoricalField::TherapyType.header(),
            CategoricalField::TherapyType.allowed_values(),
        ),
        mapping(
            CategoricalField::EmotionalState.header(),
            CategoricalField::EmotionalState.allowed_values(),
        ),
        mapping("Outcome", &["Improved", "Stable", "Declined"]),
    ])
}

pub fn stub_pair_parts(probabilities: Vec<f64>) -> (EncoderSet, StubClassifier) {
    let encoders = stub_encoders();
    let model = StubClassifier::for_encoders(&encoders, probabilities);
    (encoders, model)
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    info: ArtifactInfo,
    encoders: String,
    model: String,
}

/// Artifact store kept in memory; saves can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<MemoryEntry>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self) -> usize {
        self.entries.lock().expect("Lock").len()
    }
}

impl ArtifactStore for MemoryStore {
    fn save<M: PersistedClassifier>(
        &self,
        encoders: &EncoderSet,
        model: &M,
    ) -> Result<ArtifactInfo, ArtifactError> {
        let encoders = serde_json::to_string(encoders)?;
        let model = serde_json::to_string(model)?;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ArtifactError::Io(std::io::Error::other("disk full")));
        }

        let mut entries = self.entries.lock().expect("Lock");
        let serial = entries.len() as u64 + 1;
        let info = ArtifactInfo {
            version: format!("mem{serial}"),
            serial,
            created_at: Utc::now(),
        };
        entries.push(MemoryEntry {
            info: info.clone(),
            encoders,
            model,
        });
        Ok(info)
    }

    fn load<M: PersistedClassifier>(&self) -> Result<StoredArtifact<M>, ArtifactError> {
        let entries = self.entries.lock().expect("Lock");
        let entry = entries
            .last()
            .ok_or_else(|| ArtifactError::NotFound("memory store is empty".into()))?;
        Ok(StoredArtifact {
            encoders: serde_json::from_str(&entry.encoders)?,
            model: serde_json::from_str(&entry.model)?,
            info: entry.info.clone(),
        })
    }

    fn active(&self) -> Result<Option<ArtifactInfo>, ArtifactError> {
        Ok(self.entries.lock().expect("Lock").last().map(|e| e.info.clone()))
    }
}

/// Labeled rows whose outcome follows treatment progress and adherence.
///
/// Categorical values cycle through every boundary value.
pub fn synthetic_rows(n: usize) -> Vec<DatasetRow> {
    let pick = |field: CategoricalField, i: usize| {
        let values = field.allowed_values();
        values[i % values.len()]
    };

    (0..n)
        .map(|i| {
            let progress = 1 + (i * 7) % 10;
            let adherence = (i * 13) % 101;
            let outcome = if progress >= 7 && adherence >= 50 {
                "Improved"
            } else if progress <= 3 {
                "Deteriorated"
            } else {
                "No Change"
            };

            let cells: [String; COLUMN_COUNT] = [
                (18 + i % 60).to_string(),
                pick(CategoricalField::Gender, i).to_string(),
                pick(CategoricalField::Diagnosis, i / 3).to_string(),
                (1 + i % 10).to_string(),
                (1 + (i * 3) % 10).to_string(),
                (1 + (i * 5) % 10).to_string(),
                (i % 15).to_string(),
                pick(CategoricalField::Medication, i / 2).to_string(),
                pick(CategoricalField::TherapyType, i / 5).to_string(),
                (4 + i % 20).to_string(),
                (1 + (i * 9) % 10).to_string(),
                progress.to_string(),
                pick(CategoricalField::EmotionalState, i).to_string(),
                adherence.to_string(),
            ];
            let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
            DatasetRow::from_raw(&refs, outcome)
        })
        .collect()
}
