//! Feature vectors and the schema a classifier was fitted against.

use serde::{Deserialize, Serialize};

use super::patient::{Column, COLUMN_ORDER};
use super::vocabulary::{EncoderSet, EncodingError};

/// A fully numeric record in [`COLUMN_ORDER`](super::patient::COLUMN_ORDER).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Admissible values of one feature column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDomain {
    /// Inclusive numeric bounds.
    Numeric { min: f64, max: f64 },
    /// Integer codes `0..cardinality`.
    Categorical { cardinality: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub domain: FeatureDomain,
}

/// Column names and domains of the feature vectors a classifier accepts.
///
/// Persisted with the classifier so that a loaded artifact can be checked
/// against the encoders it is paired with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    #[must_use]
    pub fn new(columns: Vec<FeatureColumn>) -> Self {
        Self { columns }
    }

    /// Derive the schema of the records encoded by `encoders`.
    ///
    /// Numeric columns take their declared domain; categorical columns take the
    /// cardinality of their fitted vocabulary.
    ///
    /// # Errors
    /// Returns `EncodingError::MissingVocabulary` if a categorical field has no vocabulary.
    pub fn for_encoders(encoders: &EncoderSet) -> Result<Self, EncodingError> {
        let columns = COLUMN_ORDER
            .iter()
            .map(|column| -> Result<FeatureColumn, EncodingError> {
                let domain = match column {
                    Column::Numeric(field) => {
                        let (min, max) = field.domain();
                        FeatureDomain::Numeric {
                            min: f64::from(min),
                            max: f64::from(max),
                        }
                    }
                    Column::Categorical(field) => FeatureDomain::Categorical {
                        cardinality: encoders.field(*field)?.len() as u32,
                    },
                };
                Ok(FeatureColumn {
                    name: column.header().to_string(),
                    domain,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check that a vector is well formed for this schema.
    ///
    /// # Errors
    /// Returns a description of the first violation: wrong length, non-finite
    /// value, numeric value out of bounds, or categorical code out of range.
    pub fn check(&self, x: &FeatureVector) -> Result<(), String> {
        if x.len() != self.columns.len() {
            return Err(format!(
                "Expected {} features, got {}",
                self.columns.len(),
                x.len()
            ));
        }

        for (column, &value) in self.columns.iter().zip(x.as_slice()) {
            if !value.is_finite() {
                return Err(format!("{}: non-finite value", column.name));
            }
            match column.domain {
                FeatureDomain::Numeric { min, max } => {
                    if value < min || value > max {
                        return Err(format!(
                            "{}: {value} out of range [{min}, {max}]",
                            column.name
                        ));
                    }
                }
                FeatureDomain::Categorical { cardinality } => {
                    if value.fract() != 0.0 || value < 0.0 || value >= f64::from(cardinality) {
                        return Err(format!(
                            "{}: code {value} outside 0..{cardinality}",
                            column.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
