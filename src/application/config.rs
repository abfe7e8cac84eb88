//! Training configuration.
//!
//! Defaults reproduce the reference model; environment variables override
//! them, and the CLI overrides the environment.

use serde::{Deserialize, Serialize};

use crate::adapters::ForestConfig;

/// Proportion and seed of the train / held-out split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutSplit {
    /// Fraction of complete rows held out from fitting, in `[0, 1)`
    pub fraction: f64,

    /// Seed of the row shuffle
    pub seed: u64,
}

impl Default for HoldoutSplit {
    fn default() -> Self {
        Self {
            fraction: 0.2,
            seed: 42,
        }
    }
}

impl HoldoutSplit {
    /// Number of rows held out of `n`.
    ///
    /// Rounds up like a test-size fraction, but always leaves at least one row
    /// for fitting.
    #[must_use]
    pub fn holdout_count(&self, n: usize) -> usize {
        if n == 0 || !(self.fraction > 0.0) {
            return 0;
        }
        let count = (n as f64 * self.fraction).ceil() as usize;
        count.min(n - 1)
    }
}

/// Configuration of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub tree_count: usize,
    pub max_depth: usize,
    pub random_seed: u64,
    pub min_samples_split: usize,
    pub holdout_fraction: f64,
    pub split_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let forest = ForestConfig::default();
        let split = HoldoutSplit::default();
        Self {
            tree_count: forest.tree_count,
            max_depth: forest.max_depth,
            random_seed: forest.random_seed,
            min_samples_split: forest.min_samples_split,
            holdout_fraction: split.fraction,
            split_seed: split.seed,
        }
    }
}

impl TrainingConfig {
    /// Defaults overridden by `MENTIS_*` environment variables.
    ///
    /// Unparseable or out-of-range values are ignored with a warning.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(x) = parse_var(&lookup, "MENTIS_TREE_COUNT", |x: &usize| *x > 0) {
            cfg.tree_count = x;
        }
        if let Some(x) = parse_var(&lookup, "MENTIS_MAX_DEPTH", |x: &usize| *x > 0) {
            cfg.max_depth = x;
        }
        if let Some(x) = parse_var(&lookup, "MENTIS_RANDOM_SEED", |_: &u64| true) {
            cfg.random_seed = x;
        }
        if let Some(x) = parse_var(&lookup, "MENTIS_HOLDOUT_FRACTION", |x: &f64| {
            (0.0..1.0).contains(x)
        }) {
            cfg.holdout_fraction = x;
        }
        if let Some(x) = parse_var(&lookup, "MENTIS_SPLIT_SEED", |_: &u64| true) {
            cfg.split_seed = x;
        }

        cfg
    }

    /// Check ranges of values that may have come from the command line.
    ///
    /// # Errors
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.tree_count == 0 {
            return Err("tree_count must be at least 1".into());
        }
        if self.max_depth == 0 {
            return Err("max_depth must be at least 1".into());
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn forest(&self) -> ForestConfig {
        ForestConfig {
            tree_count: self.tree_count,
            max_depth: self.max_depth,
            random_seed: self.random_seed,
            min_samples_split: self.min_samples_split,
        }
    }

    #[must_use]
    pub fn holdout(&self) -> HoldoutSplit {
        HoldoutSplit {
            fraction: self.holdout_fraction,
            seed: self.split_seed,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    accept: impl Fn(&T) -> bool,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(x) if accept(&x) => Some(x),
        _ => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}
