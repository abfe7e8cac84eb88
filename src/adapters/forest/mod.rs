//! Random forest adapter: Implementation of the classifier ports.
//!
//! Bagged ensemble of CART trees. Each tree is grown on a bootstrap sample
//! with per-node feature subsampling; class probabilities are the average of
//! the leaf distributions reached in every tree.
//!
//! # Reproducibility
//!
//! A master `ChaCha8Rng` seeded from `random_seed` draws one seed per tree up
//! front. Trees are then grown in parallel (rayon), each from its own stream,
//! so the fitted forest does not depend on thread scheduling.

mod tree;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{ClassPrediction, ClassProbabilities, FeatureSchema, FeatureVector};
use crate::ports::{ClassifierError, ClassifierTrainer, OutcomeClassifier, TrainingSet};

pub use tree::{DecisionTree, Node};
use tree::TreeParams;

/// Hyperparameters of the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub tree_count: usize,

    /// Maximum number of split levels per tree
    pub max_depth: usize,

    /// Seed for bootstrap sampling and feature subsampling
    pub random_seed: u64,

    /// Nodes with fewer samples become leaves
    pub min_samples_split: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            tree_count: 300,
            max_depth: 12,
            random_seed: 42,
            min_samples_split: 2,
        }
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ForestParts")]
pub struct RandomForest {
    config: ForestConfig,
    schema: FeatureSchema,
    n_classes: u32,
    trees: Vec<DecisionTree>,
}

/// Unvalidated serialized form of [`RandomForest`].
#[derive(Deserialize)]
struct ForestParts {
    config: ForestConfig,
    schema: FeatureSchema,
    n_classes: u32,
    trees: Vec<DecisionTree>,
}

impl TryFrom<ForestParts> for RandomForest {
    type Error = String;

    fn try_from(parts: ForestParts) -> Result<Self, Self::Error> {
        if parts.trees.is_empty() {
            return Err("empty forest".into());
        }
        if parts.n_classes == 0 {
            return Err("forest has no classes".into());
        }
        for (i, tree) in parts.trees.iter().enumerate() {
            tree.validate(parts.schema.len(), parts.n_classes as usize)
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(Self {
            config: parts.config,
            schema: parts.schema,
            n_classes: parts.n_classes,
            trees: parts.trees,
        })
    }
}

impl RandomForest {
    #[must_use]
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Average tree depth across the forest.
    #[must_use]
    pub fn avg_depth(&self) -> f64 {
        let total: usize = self.trees.iter().map(DecisionTree::depth).sum();
        total as f64 / self.trees.len() as f64
    }

    /// Total number of nodes across all trees.
    #[must_use]
    pub fn total_nodes(&self) -> usize {
        self.trees.iter().map(DecisionTree::n_nodes).sum()
    }
}

impl OutcomeClassifier for RandomForest {
    fn predict(&self, x: &FeatureVector) -> Result<ClassPrediction, ClassifierError> {
        self.schema
            .check(x)
            .map_err(ClassifierError::InvalidFeatureVector)?;

        let mut sums = vec![0.0; self.n_classes as usize];
        for tree in &self.trees {
            for (sum, p) in sums.iter_mut().zip(tree.predict_distribution(x.as_slice())) {
                *sum += p;
            }
        }

        // Each leaf distribution sums to 1; renormalize to absorb rounding drift
        let total: f64 = sums.iter().sum();
        let probabilities = sums.into_iter().map(|s| s / total).collect();

        ClassPrediction::from_probabilities(ClassProbabilities::new(probabilities)).ok_or_else(
            || ClassifierError::InvalidFeatureVector("forest produced no distribution".into()),
        )
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn n_classes(&self) -> u32 {
        self.n_classes
    }
}

/// Fits [`RandomForest`]s with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct RandomForestTrainer {
    config: ForestConfig,
}

impl RandomForestTrainer {
    #[must_use]
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

impl ClassifierTrainer for RandomForestTrainer {
    type Model = RandomForest;

    fn train(&self, data: &TrainingSet) -> Result<RandomForest, ClassifierError> {
        let cfg = self.config;
        if cfg.tree_count == 0 {
            return Err(ClassifierError::Fit("tree_count must be at least 1".into()));
        }
        data.check()?;

        let n_rows = data.len();
        let n_features = data.schema.len();
        let params = TreeParams {
            max_depth: cfg.max_depth,
            min_samples_split: cfg.min_samples_split.max(2),
            max_features: ((n_features as f64).sqrt() as usize).max(1),
            n_classes: data.n_classes as usize,
        };

        tracing::info!(
            "Fitting random forest: {} trees, max_depth={}, {} rows, {} features, {} classes",
            cfg.tree_count,
            cfg.max_depth,
            n_rows,
            n_features,
            data.n_classes
        );

        let mut master = ChaCha8Rng::seed_from_u64(cfg.random_seed);
        let seeds: Vec<u64> = (0..cfg.tree_count).map(|_| master.gen()).collect();

        let trees: Vec<DecisionTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
                DecisionTree::fit(&data.features, &data.labels, sample, &params, &mut rng)
            })
            .collect();

        let forest = RandomForest {
            config: cfg,
            schema: data.schema.clone(),
            n_classes: data.n_classes,
            trees,
        };
        tracing::debug!(
            "Forest fitted: {} nodes, average depth {:.2}",
            forest.total_nodes(),
            forest.avg_depth()
        );
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureColumn, FeatureDomain};

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            FeatureColumn {
                name: "score".into(),
                domain: FeatureDomain::Numeric { min: 0.0, max: 10.0 },
            },
            FeatureColumn {
                name: "group".into(),
                domain: FeatureDomain::Categorical { cardinality: 3 },
            },
        ])
    }

    /// Class 0 for low scores, 1 for mid, 2 for high; group is noise.
    fn three_class_set() -> TrainingSet {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60u32 {
            let score = f64::from(i % 11);
            features.push(FeatureVector::new(vec![score, f64::from(i % 3)]));
            labels.push(match i % 11 {
                0..=3 => 0,
                4..=7 => 1,
                _ => 2,
            });
        }
        TrainingSet {
            features,
            labels,
            schema: schema(),
            n_classes: 3,
        }
    }

    fn small_config(seed: u64) -> ForestConfig {
        ForestConfig {
            tree_count: 25,
            max_depth: 6,
            random_seed: seed,
            min_samples_split: 2,
        }
    }

    #[test]
    fn test_forest_learns_thresholds() {
        let forest = RandomForestTrainer::new(small_config(42))
            .train(&three_class_set())
            .expect("Should train");

        assert_eq!(forest.n_trees(), 25);
        let low = forest.predict(&FeatureVector::new(vec![1.0, 0.0])).expect("Valid");
        let high = forest.predict(&FeatureVector::new(vec![10.0, 2.0])).expect("Valid");
        assert_eq!(low.class_code, 0);
        assert_eq!(high.class_code, 2);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let forest = RandomForestTrainer::new(small_config(42))
            .train(&three_class_set())
            .expect("Should train");

        for score in 0..=10 {
            for group in 0..3 {
                let x = FeatureVector::new(vec![f64::from(score), f64::from(group)]);
                let prediction = forest.predict(&x).expect("Valid");
                assert_eq!(prediction.probabilities.as_slice().len(), 3);
                assert!((prediction.probabilities.sum() - 1.0).abs() < 1e-9);
                assert!(prediction
                    .probabilities
                    .as_slice()
                    .iter()
                    .all(|p| (0.0..=1.0).contains(p)));
            }
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let data = three_class_set();
        let a = RandomForestTrainer::new(small_config(9)).train(&data).expect("Should train");
        let b = RandomForestTrainer::new(small_config(9)).train(&data).expect("Should train");
        assert_eq!(a, b);

        let c = RandomForestTrainer::new(small_config(10)).train(&data).expect("Should train");
        assert_ne!(a.trees(), c.trees());
    }

    #[test]
    fn test_invalid_feature_vectors() {
        let forest = RandomForestTrainer::new(small_config(1))
            .train(&three_class_set())
            .expect("Should train");

        let wrong_len = forest.predict(&FeatureVector::new(vec![1.0]));
        assert!(matches!(wrong_len, Err(ClassifierError::InvalidFeatureVector(_))));

        let bad_code = forest.predict(&FeatureVector::new(vec![1.0, 3.0]));
        assert!(matches!(bad_code, Err(ClassifierError::InvalidFeatureVector(_))));

        let out_of_range = forest.predict(&FeatureVector::new(vec![11.0, 0.0]));
        assert!(matches!(out_of_range, Err(ClassifierError::InvalidFeatureVector(_))));
    }

    #[test]
    fn test_single_class_fails_fit() {
        let mut data = three_class_set();
        data.labels.iter_mut().for_each(|l| *l = 1);
        let err = RandomForestTrainer::new(small_config(1))
            .train(&data)
            .expect_err("One class");
        assert!(matches!(err, ClassifierError::Fit(_)));
    }

    #[test]
    fn test_zero_trees_fails_fit() {
        let cfg = ForestConfig {
            tree_count: 0,
            ..small_config(1)
        };
        assert!(RandomForestTrainer::new(cfg).train(&three_class_set()).is_err());
    }

    #[test]
    fn test_serde_round_trip_and_validation() {
        let forest = RandomForestTrainer::new(small_config(3))
            .train(&three_class_set())
            .expect("Should train");
        let json = serde_json::to_string(&forest).expect("Should serialize");
        let restored: RandomForest = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(restored, forest);

        let mut value: serde_json::Value = serde_json::from_str(&json).expect("Valid JSON");
        value["n_classes"] = serde_json::json!(5);
        assert!(serde_json::from_value::<RandomForest>(value).is_err());
    }
}
