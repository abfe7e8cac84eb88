//! Vocabulary encoders: frozen category <-> code mappings.
//!
//! A [`VocabularyMapping`] is fitted once from a training column and never
//! mutated afterwards. Codes are assigned in sorted order of the distinct
//! categories, so fitting the same column twice yields the same mapping.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::features::FeatureVector;
use super::patient::{CategoricalField, Column, PatientRecord, COLUMN_COUNT, COLUMN_ORDER, OUTCOME_HEADER};

/// Errors raised while encoding or decoding categories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("Cannot fit vocabulary for '{0}' from an empty column")]
    EmptyColumn(String),

    #[error("Duplicate category '{value}' in vocabulary for '{field}'")]
    DuplicateCategory { field: String, value: String },

    #[error("Unknown category '{value}' for field '{field}'")]
    UnknownCategory { field: String, value: String },

    #[error("Invalid code {code} for field '{field}' (cardinality {cardinality})")]
    InvalidCode {
        field: String,
        code: u32,
        cardinality: usize,
    },

    #[error("No vocabulary for field '{0}'")]
    MissingVocabulary(String),
}

/// Bijection between the categories of one field and the codes `0..k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyMapping {
    field: String,
    categories: Vec<String>,
    codes: HashMap<String, u32>,
}

impl VocabularyMapping {
    /// Fit a mapping over a column of values.
    ///
    /// Distinct values are sorted and numbered from zero.
    ///
    /// # Errors
    /// Returns `EncodingError::EmptyColumn` if the column has no values.
    pub fn fit<I, S>(field: impl Into<String>, values: I) -> Result<Self, EncodingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let field = field.into();
        let distinct: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        if distinct.is_empty() {
            return Err(EncodingError::EmptyColumn(field));
        }
        Self::from_categories(field, distinct.into_iter().collect())
    }

    /// Build a mapping with an explicit code order (`categories[i]` gets code `i`).
    ///
    /// # Errors
    /// Returns error if `categories` is empty or contains duplicates.
    pub fn from_categories(
        field: impl Into<String>,
        categories: Vec<String>,
    ) -> Result<Self, EncodingError> {
        let field = field.into();
        if categories.is_empty() {
            return Err(EncodingError::EmptyColumn(field));
        }

        let mut codes = HashMap::with_capacity(categories.len());
        for (code, category) in categories.iter().enumerate() {
            if codes.insert(category.clone(), code as u32).is_some() {
                return Err(EncodingError::DuplicateCategory {
                    field,
                    value: category.clone(),
                });
            }
        }

        Ok(Self {
            field,
            categories,
            codes,
        })
    }

    /// Look up the code of a category.
    ///
    /// # Errors
    /// Returns `EncodingError::UnknownCategory` if `value` was not seen during fitting.
    pub fn encode(&self, value: &str) -> Result<u32, EncodingError> {
        self.codes
            .get(value)
            .copied()
            .ok_or_else(|| EncodingError::UnknownCategory {
                field: self.field.clone(),
                value: value.to_string(),
            })
    }

    /// Look up the category of a code.
    ///
    /// # Errors
    /// Returns `EncodingError::InvalidCode` if `code` is outside `0..len()`.
    pub fn decode(&self, code: u32) -> Result<&str, EncodingError> {
        self.categories
            .get(code as usize)
            .map(String::as_str)
            .ok_or_else(|| EncodingError::InvalidCode {
                field: self.field.clone(),
                code,
                cardinality: self.categories.len(),
            })
    }

    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.codes.contains_key(value)
    }

    /// Field this mapping was fitted for.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Categories in code order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of categories (the cardinality `k`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// The six vocabularies of an artifact: one per categorical input field plus
/// the outcome label, keyed by dataset column header.
///
/// Serialized as a map from field name to its categories in code order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct EncoderSet {
    mappings: BTreeMap<String, VocabularyMapping>,
}

impl EncoderSet {
    /// Fit all six vocabularies from the same set of rows.
    ///
    /// # Errors
    /// Returns `EncodingError::EmptyColumn` if there are no rows.
    pub fn fit(records: &[PatientRecord], outcomes: &[String]) -> Result<Self, EncodingError> {
        let mut mappings = BTreeMap::new();
        for field in CategoricalField::ALL {
            let mapping =
                VocabularyMapping::fit(field.header(), records.iter().map(|r| r.categorical(field)))?;
            mappings.insert(field.header().to_string(), mapping);
        }
        let outcome = VocabularyMapping::fit(OUTCOME_HEADER, outcomes)?;
        mappings.insert(OUTCOME_HEADER.to_string(), outcome);

        Ok(Self { mappings })
    }

    /// Assemble a set from already built mappings, keyed by each mapping's field.
    #[must_use]
    pub fn from_mappings(mappings: impl IntoIterator<Item = VocabularyMapping>) -> Self {
        Self {
            mappings: mappings
                .into_iter()
                .map(|m| (m.field().to_string(), m))
                .collect(),
        }
    }

    /// Mapping stored under `key`.
    ///
    /// # Errors
    /// Returns `EncodingError::MissingVocabulary` if the set has no such field.
    pub fn get(&self, key: &str) -> Result<&VocabularyMapping, EncodingError> {
        self.mappings
            .get(key)
            .ok_or_else(|| EncodingError::MissingVocabulary(key.to_string()))
    }

    /// Mapping of a categorical input field.
    ///
    /// # Errors
    /// Returns `EncodingError::MissingVocabulary` if the field is absent.
    pub fn field(&self, field: CategoricalField) -> Result<&VocabularyMapping, EncodingError> {
        self.get(field.header())
    }

    /// Mapping of the outcome label.
    ///
    /// # Errors
    /// Returns `EncodingError::MissingVocabulary` if the outcome vocabulary is absent.
    pub fn outcome(&self) -> Result<&VocabularyMapping, EncodingError> {
        self.get(OUTCOME_HEADER)
    }

    /// Field names present in the set, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Encode a record into a feature vector in [`COLUMN_ORDER`].
    ///
    /// Numeric values pass through unchanged.
    ///
    /// # Errors
    /// Returns `EncodingError::UnknownCategory` for any categorical value absent
    /// from its vocabulary.
    pub fn encode_record(&self, record: &PatientRecord) -> Result<FeatureVector, EncodingError> {
        let mut values = Vec::with_capacity(COLUMN_COUNT);
        for column in COLUMN_ORDER {
            let value = match column {
                Column::Numeric(field) => f64::from(record.numeric(field)),
                Column::Categorical(field) => {
                    f64::from(self.field(field)?.encode(record.categorical(field))?)
                }
            };
            values.push(value);
        }
        Ok(FeatureVector::new(values))
    }

    /// Decode an outcome class code to its label.
    ///
    /// # Errors
    /// Returns `EncodingError::InvalidCode` for a code outside the outcome vocabulary.
    pub fn decode_outcome(&self, code: u32) -> Result<&str, EncodingError> {
        self.outcome()?.decode(code)
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for EncoderSet {
    type Error = EncodingError;

    fn try_from(raw: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        let mappings = raw
            .into_iter()
            .map(|(field, categories)| {
                VocabularyMapping::from_categories(field.clone(), categories).map(|m| (field, m))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { mappings })
    }
}

impl From<EncoderSet> for BTreeMap<String, Vec<String>> {
    fn from(set: EncoderSet) -> Self {
        set.mappings
            .into_iter()
            .map(|(field, m)| (field, m.categories))
            .collect()
    }
}
