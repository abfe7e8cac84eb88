//! Training service: Fits and persists a new artifact pair.
//!
//! The run is a single offline batch:
//! - Drop rows with any missing value
//! - Fit the six vocabularies on the surviving rows and encode them
//! - Shuffle with a fixed seed and hold out a fraction for evaluation
//! - Fit the classifier on the remainder
//! - Persist encoders and classifier together
//!
//! Nothing is written unless every step succeeds, so a failed run leaves the
//! previously active pair in place.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::application::{ArtifactPair, HoldoutSplit};
use crate::domain::{EncoderSet, FeatureSchema, FeatureVector, PatientRecord};
use crate::ports::{
    ArtifactInfo, ArtifactStore, ClassifierError, ClassifierTrainer, DatasetError, DatasetSource,
    OutcomeClassifier, PersistedClassifier, TrainingSet,
};

/// Summary of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    /// Rows read from the dataset
    pub rows_total: usize,

    /// Rows discarded for missing values
    pub rows_dropped: usize,

    pub train_rows: usize,

    pub holdout_rows: usize,

    /// Outcome classes in the fitted vocabulary
    pub n_classes: u32,

    /// Fraction of held-out rows classified correctly; `None` with no held-out rows
    pub holdout_accuracy: Option<f64>,

    /// The newly active artifact
    pub artifact: ArtifactInfo,
}

/// Terminal state of a training run.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    Succeeded(TrainingReport),

    /// No complete rows survived the missing-value filter
    FailedNoData,

    /// The classifier could not be fitted
    FailedFit(ClassifierError),
}

/// Service that trains a classifier and stores it with its encoders.
pub struct TrainingService<T, S>
where
    T: ClassifierTrainer,
    S: ArtifactStore,
{
    trainer: T,
    store: Arc<S>,
    split: HoldoutSplit,
}

impl<T, S> TrainingService<T, S>
where
    T: ClassifierTrainer,
    T::Model: PersistedClassifier,
    S: ArtifactStore,
{
    /// Create a new training service.
    pub fn new(trainer: T, store: Arc<S>, split: HoldoutSplit) -> Self {
        Self {
            trainer,
            store,
            split,
        }
    }

    /// Run the training pipeline over a dataset.
    ///
    /// `FailedNoData` and `FailedFit` are reported as outcomes, not errors.
    ///
    /// # Errors
    /// Returns error if the dataset cannot be read, a complete row holds an
    /// invalid numeric value, or the artifact pair cannot be persisted.
    pub fn run<D: DatasetSource>(&self, source: &D) -> crate::Result<TrainingOutcome> {
        tracing::info!("Starting training pipeline...");

        let rows = source.load_rows()?;
        let rows_total = rows.len();

        let mut records = Vec::new();
        let mut outcomes = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if !row.is_complete() {
                continue;
            }
            let cells: Vec<&str> = row.cells.iter().map(|c| c.as_deref().unwrap_or("")).collect();
            let record = PatientRecord::from_cells(&cells).map_err(|message| {
                DatasetError::InvalidValue {
                    row: idx + 1,
                    message,
                }
            })?;
            records.push(record);
            outcomes.push(row.outcome.as_deref().unwrap_or("").trim().to_string());
        }

        let rows_dropped = rows_total - records.len();
        tracing::info!(
            "Dataset: {} rows, {} dropped for missing values",
            rows_total,
            rows_dropped
        );
        if records.is_empty() {
            tracing::warn!("No complete rows remain; nothing to train on");
            return Ok(TrainingOutcome::FailedNoData);
        }

        // Step 1: Fit vocabularies and encode
        let encoders = EncoderSet::fit(&records, &outcomes)?;
        let schema = FeatureSchema::for_encoders(&encoders)?;
        let features = records
            .iter()
            .map(|r| encoders.encode_record(r))
            .collect::<Result<Vec<_>, _>>()?;
        let outcome_vocab = encoders.outcome()?;
        let labels = outcomes
            .iter()
            .map(|o| outcome_vocab.encode(o))
            .collect::<Result<Vec<_>, _>>()?;
        let n_classes = outcome_vocab.len() as u32;
        tracing::debug!(
            "Fitted vocabularies: {}",
            encoders
                .keys()
                .map(|k| format!("{k}={}", encoders.get(k).map(|m| m.len()).unwrap_or(0)))
                .collect::<Vec<_>>()
                .join(", ")
        );

        // Step 2: Seeded train / held-out split
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(self.split.seed));
        let (holdout_idx, train_idx) = order.split_at(self.split.holdout_count(order.len()));

        let take = |idx: &[usize]| -> (Vec<FeatureVector>, Vec<u32>) {
            idx.iter().map(|&i| (features[i].clone(), labels[i])).unzip()
        };
        let (train_x, train_y) = take(train_idx);
        let (holdout_x, holdout_y) = take(holdout_idx);

        // Step 3: Fit
        let training_set = TrainingSet {
            features: train_x,
            labels: train_y,
            schema,
            n_classes,
        };
        let model = match self.trainer.train(&training_set) {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!("Classifier fit failed: {}", e);
                return Ok(TrainingOutcome::FailedFit(e));
            }
        };

        // Step 4: Evaluate
        let holdout_accuracy = if holdout_x.is_empty() {
            None
        } else {
            let mut correct = 0usize;
            for (x, &y) in holdout_x.iter().zip(&holdout_y) {
                if model.predict(x)?.class_code == y {
                    correct += 1;
                }
            }
            Some(correct as f64 / holdout_x.len() as f64)
        };

        // Step 5: Persist the pair
        let pair = ArtifactPair::new(encoders, model)?;
        let artifact = self.store.save(pair.encoders(), pair.model())?;

        let report = TrainingReport {
            rows_total,
            rows_dropped,
            train_rows: train_idx.len(),
            holdout_rows: holdout_idx.len(),
            n_classes,
            holdout_accuracy,
            artifact,
        };
        match report.holdout_accuracy {
            Some(acc) => tracing::info!(
                "Training complete: artifact {}, held-out accuracy {:.2}%",
                report.artifact.version,
                acc * 100.0
            ),
            None => tracing::info!(
                "Training complete: artifact {}, no held-out rows",
                report.artifact.version
            ),
        }
        Ok(TrainingOutcome::Succeeded(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ForestConfig, RandomForest, RandomForestTrainer};
    use crate::application::testing::{synthetic_rows, MemoryStore};
    use crate::application::InferenceService;
    use crate::domain::{sample_record, COLUMN_COUNT};
    use crate::ports::DatasetRow;
    use crate::MentisError;

    fn trainer() -> RandomForestTrainer {
        RandomForestTrainer::new(ForestConfig {
            tree_count: 20,
            max_depth: 8,
            random_seed: 42,
            min_samples_split: 2,
        })
    }

    fn service(store: &Arc<MemoryStore>) -> TrainingService<RandomForestTrainer, MemoryStore> {
        TrainingService::new(trainer(), Arc::clone(store), HoldoutSplit::default())
    }

    fn expect_report(outcome: TrainingOutcome) -> TrainingReport {
        match outcome {
            TrainingOutcome::Succeeded(report) => report,
            other => panic!("Expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_successful_run_persists_pair() {
        let store = Arc::new(MemoryStore::default());
        let report = expect_report(service(&store).run(&synthetic_rows(120)).expect("Should run"));

        assert_eq!(report.rows_total, 120);
        assert_eq!(report.rows_dropped, 0);
        assert_eq!(report.holdout_rows, 24);
        assert_eq!(report.train_rows, 96);
        assert_eq!(report.n_classes, 3);
        let accuracy = report.holdout_accuracy.expect("Held-out rows exist");
        assert!((0.0..=1.0).contains(&accuracy));
        assert_eq!(store.saved(), 1);
        assert_eq!(report.artifact.serial, 1);
    }

    #[test]
    fn test_incomplete_rows_are_excluded() {
        let mut rows = synthetic_rows(60);
        // A row with a category seen nowhere else, but a missing label
        let mut cells: Vec<String> = rows[0].cells.iter().map(|c| c.clone().unwrap_or_default()).collect();
        cells[7] = "Experimental".into();
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        rows.push(DatasetRow::from_raw(&refs, ""));
        // A row with a missing numeric value and an unseen outcome
        let mut cells = cells.clone();
        cells[7] = "SSRIs".into();
        cells[3] = String::new();
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        rows.push(DatasetRow::from_raw(&refs, "Remission"));

        let store = Arc::new(MemoryStore::default());
        let report = expect_report(service(&store).run(&rows).expect("Should run"));
        assert_eq!(report.rows_total, 62);
        assert_eq!(report.rows_dropped, 2);

        let stored = store.load::<RandomForest>().expect("Should load");
        let medication = stored
            .encoders
            .get("Medication")
            .expect("Medication vocabulary");
        assert!(!medication.contains("Experimental"));
        assert!(!stored.encoders.outcome().expect("Outcome").contains("Remission"));
        assert_eq!(report.train_rows + report.holdout_rows, 60);
    }

    #[test]
    fn test_no_complete_rows_fails_without_writing() {
        let cells = vec![""; COLUMN_COUNT];
        let rows = vec![DatasetRow::from_raw(&cells, "Improved")];

        let store = Arc::new(MemoryStore::default());
        let outcome = service(&store).run(&rows).expect("Should run");
        assert_eq!(outcome, TrainingOutcome::FailedNoData);
        assert_eq!(store.saved(), 0);

        let outcome = service(&store).run(&Vec::<DatasetRow>::new()).expect("Should run");
        assert_eq!(outcome, TrainingOutcome::FailedNoData);
    }

    #[test]
    fn test_single_outcome_class_fails_fit() {
        let rows: Vec<DatasetRow> = synthetic_rows(30)
            .into_iter()
            .map(|mut r| {
                r.outcome = Some("Improved".into());
                r
            })
            .collect();

        let store = Arc::new(MemoryStore::default());
        let outcome = service(&store).run(&rows).expect("Should run");
        assert!(matches!(outcome, TrainingOutcome::FailedFit(ClassifierError::Fit(_))));
        assert_eq!(store.saved(), 0);
    }

    #[test]
    fn test_failed_save_keeps_previous_pair() {
        let store = Arc::new(MemoryStore::default());
        let first = expect_report(service(&store).run(&synthetic_rows(80)).expect("Should run"));

        store.fail_saves(true);
        let err = service(&store).run(&synthetic_rows(90)).expect_err("Save fails");
        assert!(matches!(err, MentisError::Artifact(_)));

        let active = store.active().expect("Readable").expect("Still active");
        assert_eq!(active, first.artifact);
    }

    #[test]
    fn test_missing_tokens_drop_rows() {
        let mut rows = synthetic_rows(40);
        rows[3].cells[4] = Some("NaN".into());
        rows[7].cells[13] = Some("NA".into());
        rows[9].outcome = Some("null".into());

        let store = Arc::new(MemoryStore::default());
        let report = expect_report(service(&store).run(&rows).expect("Should run"));
        assert_eq!(report.rows_total, 40);
        assert_eq!(report.rows_dropped, 3);
        assert_eq!(report.train_rows + report.holdout_rows, 37);
        assert_eq!(store.saved(), 1);
    }

    #[test]
    fn test_invalid_numeric_cell_is_an_error() {
        let mut rows = synthetic_rows(20);
        rows[4].cells[0] = Some("forty".into());

        let store = Arc::new(MemoryStore::default());
        let err = service(&store).run(&rows).expect_err("Bad cell");
        assert!(matches!(
            err,
            MentisError::Dataset(DatasetError::InvalidValue { row: 5, .. })
        ));
    }

    #[test]
    fn test_training_is_deterministic() {
        let rows = synthetic_rows(100);
        let store_a = Arc::new(MemoryStore::default());
        let store_b = Arc::new(MemoryStore::default());
        let a = expect_report(service(&store_a).run(&rows).expect("Should run"));
        let b = expect_report(service(&store_b).run(&rows).expect("Should run"));
        assert_eq!(a.holdout_accuracy, b.holdout_accuracy);

        let loaded_a = store_a.load::<RandomForest>().expect("Should load");
        let loaded_b = store_b.load::<RandomForest>().expect("Should load");
        assert_eq!(loaded_a.encoders, loaded_b.encoders);
        assert_eq!(loaded_a.model, loaded_b.model);

        let service_a = InferenceService::<RandomForest>::from_store(store_a.as_ref())
            .expect("Should load");
        let service_b = InferenceService::<RandomForest>::from_store(store_b.as_ref())
            .expect("Should load");
        let record = sample_record();
        assert_eq!(
            service_a.predict(&record).expect("Should predict"),
            service_b.predict(&record).expect("Should predict")
        );
    }
}
