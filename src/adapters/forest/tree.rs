//! CART decision tree used as the forest's base learner.
//!
//! Trees are stored as a flat node array with the root at index 0. Children are
//! always pushed after their parent, so every child index is greater than its
//! parent's.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::FeatureVector;

/// Improvement below this is treated as no improvement.
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

/// A node of a decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Go to `left` if `x[feature] <= threshold`, else to `right`.
    Split {
        feature: u32,
        threshold: f64,
        left: u32,
        right: u32,
    },
    /// Class distribution of the training samples that reached this leaf.
    Leaf { distribution: Vec<f64> },
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(super) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: usize,
    pub n_classes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `sample` (bootstrap indices, repeats allowed).
    pub(super) fn fit<R: Rng>(
        features: &[FeatureVector],
        labels: &[u32],
        sample: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = Builder {
            features,
            labels,
            params,
            nodes: Vec::new(),
        };
        let mut sample = sample;
        builder.grow(&mut sample, 0, rng);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Class distribution of the leaf `x` falls into.
    #[must_use]
    pub fn predict_distribution(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature as usize] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of split levels on the longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Check structural invariants of a deserialized tree.
    ///
    /// # Errors
    /// Returns a description of the first broken invariant.
    pub(super) fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature as usize >= n_features {
                        return Err(format!("node {idx} splits on unknown feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                    for child in [*left as usize, *right as usize] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                }
                Node::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "leaf {idx} has {} classes, expected {n_classes}",
                            distribution.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

struct Builder<'a> {
    features: &'a [FeatureVector],
    labels: &'a [u32],
    params: &'a TreeParams,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn value(&self, row: usize, feature: usize) -> f64 {
        self.features[row].as_slice()[feature]
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.params.n_classes];
        for &row in rows {
            counts[self.labels[row] as usize] += 1.0;
        }
        counts
    }

    fn leaf(&mut self, counts: Vec<f64>, idx: usize) {
        let total: f64 = counts.iter().sum();
        let distribution = counts.into_iter().map(|c| c / total).collect();
        self.nodes[idx] = Node::Leaf { distribution };
    }

    fn grow<R: Rng>(&mut self, rows: &mut [usize], depth: usize, rng: &mut R) -> u32 {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });

        let counts = self.class_counts(rows);
        let pure = counts.iter().filter(|&&c| c > 0.0).count() <= 1;
        if pure || depth >= self.params.max_depth || rows.len() < self.params.min_samples_split {
            self.leaf(counts, idx);
            return idx as u32;
        }

        let Some(split) = self.best_split(rows, &counts, rng) else {
            self.leaf(counts, idx);
            return idx as u32;
        };

        // Partition rows in place: left block first
        let mut boundary = 0;
        for i in 0..rows.len() {
            if self.value(rows[i], split.feature) <= split.threshold {
                rows.swap(i, boundary);
                boundary += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(boundary);

        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);
        self.nodes[idx] = Node::Split {
            feature: split.feature as u32,
            threshold: split.threshold,
            left,
            right,
        };
        idx as u32
    }

    /// Best Gini split over a random subset of features.
    ///
    /// Features are visited in random order; the search stops after
    /// `max_features` features once a valid split has been found, and keeps
    /// going otherwise.
    fn best_split<R: Rng>(
        &self,
        rows: &[usize],
        parent_counts: &[f64],
        rng: &mut R,
    ) -> Option<SplitCandidate> {
        let n_features = self.features[rows[0]].len();
        let mut order: Vec<usize> = (0..n_features).collect();
        order.shuffle(rng);

        let n = rows.len() as f64;
        let parent_impurity = n * gini(parent_counts, n);
        let mut best: Option<SplitCandidate> = None;

        let mut sorted = rows.to_vec();
        for (visited, &feature) in order.iter().enumerate() {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }

            sorted.sort_by(|&a, &b| self.value(a, feature).total_cmp(&self.value(b, feature)));

            let mut left = vec![0.0; self.params.n_classes];
            let mut right = parent_counts.to_vec();
            for k in 0..sorted.len() - 1 {
                let label = self.labels[sorted[k]] as usize;
                left[label] += 1.0;
                right[label] -= 1.0;

                let here = self.value(sorted[k], feature);
                let next = self.value(sorted[k + 1], feature);
                if here >= next {
                    continue;
                }

                let n_left = (k + 1) as f64;
                let n_right = n - n_left;
                let impurity = n_left * gini(&left, n_left) + n_right * gini(&right, n_right);
                if impurity >= parent_impurity - MIN_IMPURITY_DECREASE {
                    continue;
                }
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(here, next),
                        impurity,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|&c| (c / total) * (c / total)).sum::<f64>()
}

fn midpoint(a: f64, b: f64) -> f64 {
    let mid = a + (b - a) / 2.0;
    // Keep `a` on the left even when the midpoint rounds up to `b`
    if mid >= b {
        a
    } else {
        mid
    }
}
