//! The encoder / classifier pair consumed by inference.
//!
//! An [`ArtifactPair`] can only be constructed from halves that agree on the
//! feature columns, the categorical cardinalities and the outcome classes, so
//! a mismatched pair is rejected at load time rather than at first prediction.

use crate::domain::{
    CategoricalField, EncoderSet, FeatureDomain, FeatureSchema, OUTCOME_HEADER,
};
use crate::ports::{ArtifactError, ArtifactInfo, OutcomeClassifier, StoredArtifact};

/// Boundary-accepted categories missing from a fitted vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyDrift {
    pub field: CategoricalField,
    pub unknown: Vec<String>,
}

/// Frozen encoders and classifier, verified to belong together.
#[derive(Debug)]
pub struct ArtifactPair<M> {
    encoders: EncoderSet,
    model: M,
    info: Option<ArtifactInfo>,
}

impl<M: OutcomeClassifier> ArtifactPair<M> {
    /// Pair encoders with a classifier.
    ///
    /// # Errors
    /// Returns `ArtifactError::Mismatch` if the halves disagree.
    pub fn new(encoders: EncoderSet, model: M) -> Result<Self, ArtifactError> {
        check_agreement(&encoders, &model)?;
        Ok(Self {
            encoders,
            model,
            info: None,
        })
    }

    /// Pair the halves of a stored artifact, keeping its metadata.
    ///
    /// # Errors
    /// Returns `ArtifactError::Mismatch` if the halves disagree.
    pub fn from_stored(stored: StoredArtifact<M>) -> Result<Self, ArtifactError> {
        let mut pair = Self::new(stored.encoders, stored.model)?;
        pair.info = Some(stored.info);
        Ok(pair)
    }

    #[must_use]
    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Store metadata, if the pair was loaded from a store.
    #[must_use]
    pub fn info(&self) -> Option<&ArtifactInfo> {
        self.info.as_ref()
    }

    /// Categories the serving boundary accepts that the fitted vocabularies do not know.
    #[must_use]
    pub fn vocabulary_drift(&self) -> Vec<VocabularyDrift> {
        CategoricalField::ALL
            .into_iter()
            .filter_map(|field| {
                let mapping = self.encoders.field(field).ok()?;
                let unknown: Vec<String> = field
                    .allowed_values()
                    .iter()
                    .filter(|v| !mapping.contains(v))
                    .map(|v| (*v).to_string())
                    .collect();
                (!unknown.is_empty()).then_some(VocabularyDrift { field, unknown })
            })
            .collect()
    }
}

fn check_agreement<M: OutcomeClassifier>(
    encoders: &EncoderSet,
    model: &M,
) -> Result<(), ArtifactError> {
    let mismatch = |msg: String| ArtifactError::Mismatch(msg);

    for field in CategoricalField::ALL {
        encoders
            .field(field)
            .map_err(|_| mismatch(format!("encoder set has no vocabulary for '{}'", field.header())))?;
    }
    let outcome = encoders
        .outcome()
        .map_err(|_| mismatch(format!("encoder set has no '{OUTCOME_HEADER}' vocabulary")))?;

    let expected_keys = CategoricalField::ALL.len() + 1;
    if encoders.len() != expected_keys {
        let extra: Vec<&str> = encoders
            .keys()
            .filter(|k| {
                *k != OUTCOME_HEADER && !CategoricalField::ALL.iter().any(|f| f.header() == *k)
            })
            .collect();
        return Err(mismatch(format!(
            "encoder set has unexpected vocabularies: {}",
            extra.join(", ")
        )));
    }

    let expected = FeatureSchema::for_encoders(encoders).map_err(|e| mismatch(e.to_string()))?;
    compare_schemas(&expected, model.schema())?;

    if model.n_classes() as usize != outcome.len() {
        return Err(mismatch(format!(
            "classifier predicts {} classes but the outcome vocabulary has {}",
            model.n_classes(),
            outcome.len()
        )));
    }
    Ok(())
}

fn compare_schemas(expected: &FeatureSchema, actual: &FeatureSchema) -> Result<(), ArtifactError> {
    if expected.len() != actual.len() {
        return Err(ArtifactError::Mismatch(format!(
            "classifier expects {} features, encoders produce {}",
            actual.len(),
            expected.len()
        )));
    }

    for (i, (want, got)) in expected.columns().iter().zip(actual.columns()).enumerate() {
        if want.name != got.name {
            return Err(ArtifactError::Mismatch(format!(
                "feature {i} is '{}' in the classifier but '{}' in the encoders",
                got.name, want.name
            )));
        }
        match (&want.domain, &got.domain) {
            (
                FeatureDomain::Categorical { cardinality: a },
                FeatureDomain::Categorical { cardinality: b },
            ) if a != b => {
                return Err(ArtifactError::Mismatch(format!(
                    "'{}' has {a} categories in the encoders but {b} in the classifier",
                    want.name
                )));
            }
            (FeatureDomain::Categorical { .. }, FeatureDomain::Categorical { .. })
            | (FeatureDomain::Numeric { .. }, FeatureDomain::Numeric { .. }) => {}
            _ => {
                return Err(ArtifactError::Mismatch(format!(
                    "'{}' is numeric on one side and categorical on the other",
                    want.name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{stub_pair_parts, StubClassifier};
    use crate::domain::{EncoderSet, VocabularyMapping};

    #[test]
    fn test_matching_pair_is_accepted() {
        let (encoders, model) = stub_pair_parts(vec![0.72, 0.20, 0.08]);
        let pair = ArtifactPair::new(encoders, model).expect("Should pair");
        assert!(pair.info().is_none());
        assert_eq!(pair.encoders().len(), 6);
    }

    #[test]
    fn test_missing_field_is_mismatch() {
        let (encoders, model) = stub_pair_parts(vec![0.72, 0.20, 0.08]);
        let without_medication = EncoderSet::from_mappings(
            encoders
                .keys()
                .filter(|k| *k != CategoricalField::Medication.header())
                .map(|k| encoders.get(k).expect("Present").clone())
                .collect::<Vec<_>>(),
        );

        let err = ArtifactPair::new(without_medication, model).expect_err("Should mismatch");
        assert!(matches!(err, ArtifactError::Mismatch(ref m) if m.contains("Medication")));
    }

    #[test]
    fn test_cardinality_disagreement_is_mismatch() {
        let (encoders, model) = stub_pair_parts(vec![0.72, 0.20, 0.08]);
        let mut mappings: Vec<VocabularyMapping> = encoders
            .keys()
            .map(|k| encoders.get(k).expect("Present").clone())
            .collect();
        for mapping in &mut mappings {
            if mapping.field() == CategoricalField::Gender.header() {
                *mapping = VocabularyMapping::from_categories(
                    "Gender",
                    vec!["Female".into(), "Male".into(), "Other".into(), "Unknown".into()],
                )
                .expect("Valid");
            }
        }

        let err = ArtifactPair::new(EncoderSet::from_mappings(mappings), model)
            .expect_err("Should mismatch");
        assert!(matches!(err, ArtifactError::Mismatch(ref m) if m.contains("Gender")));
    }

    #[test]
    fn test_class_count_disagreement_is_mismatch() {
        let (encoders, _) = stub_pair_parts(vec![0.72, 0.20, 0.08]);
        let model = StubClassifier::for_encoders(&encoders, vec![0.5, 0.5]);
        let err = ArtifactPair::new(encoders, model).expect_err("Should mismatch");
        assert!(matches!(err, ArtifactError::Mismatch(ref m) if m.contains("classes")));
    }

    #[test]
    fn test_vocabulary_drift_lists_unseen_boundary_values() {
        let (encoders, model) = stub_pair_parts(vec![0.72, 0.20, 0.08]);
        let pair = ArtifactPair::new(encoders, model).expect("Should pair");
        let drift = pair.vocabulary_drift();

        let gender = drift
            .iter()
            .find(|d| d.field == CategoricalField::Gender)
            .expect("Gender vocabulary lacks 'Other'");
        assert_eq!(gender.unknown, vec!["Other".to_string()]);
        assert!(drift.iter().all(|d| d.field != CategoricalField::EmotionalState));
    }
}
