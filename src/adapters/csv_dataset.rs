//! CSV adapter: Implementation of DatasetSource.
//!
//! Reads the treatment dataset export. Columns are located by header name, so
//! column order in the file does not matter and unrelated columns (patient id,
//! start date) are ignored. Empty cells and missing tokens such as `NA` or
//! `NaN` are reported as missing values.

use std::io::Read;
use std::path::PathBuf;

use crate::domain::{COLUMN_ORDER, OUTCOME_HEADER};
use crate::ports::{is_missing, DatasetError, DatasetRow, DatasetSource};

/// Dataset source backed by a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvDataset {
    path: PathBuf,
}

impl CsvDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse rows from any reader.
    ///
    /// # Errors
    /// Returns `DatasetError::MissingColumn` if a required header is absent and
    /// `DatasetError::Malformed` for CSV syntax errors.
    pub fn read_rows<R: Read>(reader: R) -> Result<Vec<DatasetRow>, DatasetError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| DatasetError::Malformed(e.to_string()))?
            .clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };

        let input_positions = COLUMN_ORDER
            .iter()
            .map(|c| position(c.header()))
            .collect::<Result<Vec<_>, _>>()?;
        let outcome_position = position(OUTCOME_HEADER)?;

        let cell = |record: &csv::StringRecord, idx: usize| {
            record
                .get(idx)
                .filter(|v| !is_missing(v))
                .map(str::to_string)
        };

        let mut rows = Vec::new();
        for result in csv.records() {
            let record = result.map_err(|e| DatasetError::Malformed(e.to_string()))?;
            rows.push(DatasetRow {
                cells: input_positions.iter().map(|&i| cell(&record, i)).collect(),
                outcome: cell(&record, outcome_position),
            });
        }
        Ok(rows)
    }
}

impl DatasetSource for CsvDataset {
    fn load_rows(&self) -> Result<Vec<DatasetRow>, DatasetError> {
        tracing::info!("Reading dataset from {}", self.path.display());
        let file = std::fs::File::open(&self.path)?;
        let rows = Self::read_rows(file)?;
        tracing::info!("Read {} dataset rows", rows.len());
        Ok(rows)
    }
}
