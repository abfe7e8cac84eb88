//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `forest`: random forest classifier (rand_chacha, rayon)
//! - `filesystem`: versioned artifact directories (serde_json, sha2)
//! - `csv_dataset`: CSV training dataset reader (csv)
//! - `sanitize`: PII filtering for logs

pub mod csv_dataset;
pub mod filesystem;
pub mod forest;
pub mod sanitize;

pub use csv_dataset::CsvDataset;
pub use filesystem::FileArtifactStore;
pub use forest::{ForestConfig, RandomForest, RandomForestTrainer};
