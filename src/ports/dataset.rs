//! Dataset port: Trait for reading labeled training rows.

use crate::domain::COLUMN_COUNT;

/// Errors that can occur while reading a training dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed dataset: {0}")]
    Malformed(String),

    #[error("Dataset is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Invalid value in row {row}: {message}")]
    InvalidValue { row: usize, message: String },
}

/// Cell texts read as a missing value, besides blank cells.
///
/// `None` is absent: it is a valid Medication and Therapy Type category.
pub const MISSING_TOKENS: [&str; 17] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "n/a", "nan", "null",
];

/// True if a raw cell holds no value.
#[must_use]
pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed)
}

/// One raw dataset row with cells in record column order.
///
/// `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    pub cells: Vec<Option<String>>,
    pub outcome: Option<String>,
}

impl DatasetRow {
    /// Build a row from raw strings; blank strings and missing tokens become missing values.
    #[must_use]
    pub fn from_raw(cells: &[&str], outcome: &str) -> Self {
        fn cell(raw: &str) -> Option<String> {
            (!is_missing(raw)).then(|| raw.trim().to_string())
        }
        Self {
            cells: cells.iter().map(|c| cell(c)).collect(),
            outcome: cell(outcome),
        }
    }

    /// True if every input column and the label are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cells.len() == COLUMN_COUNT
            && self
                .cells
                .iter()
                .all(|c| c.as_deref().is_some_and(|v| !is_missing(v)))
            && self.outcome.as_deref().is_some_and(|v| !is_missing(v))
    }
}

/// Any component that can supply labeled training rows.
pub trait DatasetSource {
    /// Load all rows, including incomplete ones.
    ///
    /// # Errors
    /// Returns error if the source cannot be read.
    fn load_rows(&self) -> Result<Vec<DatasetRow>, DatasetError>;
}

impl DatasetSource for Vec<DatasetRow> {
    fn load_rows(&self) -> Result<Vec<DatasetRow>, DatasetError> {
        Ok(self.clone())
    }
}
