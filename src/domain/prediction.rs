//! Prediction result types.
//!
//! Represents the output of the outcome classifier and the decoded,
//! human-readable result returned to callers.

use serde::{Deserialize, Serialize};

/// Probability distribution over outcome class codes.
///
/// Index `i` holds the probability of class code `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassProbabilities(Vec<f64>);

impl ClassProbabilities {
    #[must_use]
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self(probabilities)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Probability of a class code (0.0 for codes outside the distribution).
    #[must_use]
    pub fn get(&self, code: u32) -> f64 {
        self.0.get(code as usize).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// The most probable class and its probability.
    ///
    /// Ties resolve to the lowest class code. Returns `None` for an empty
    /// distribution.
    #[must_use]
    pub fn best(&self) -> Option<(u32, f64)> {
        let mut best: Option<(u32, f64)> = None;
        for (code, &p) in self.0.iter().enumerate() {
            match best {
                Some((_, top)) if p <= top => {}
                _ => best = Some((code as u32, p)),
            }
        }
        best
    }
}

/// Raw classifier output for one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPrediction {
    /// Winning class code
    pub class_code: u32,

    /// Full distribution over class codes (sums to 1)
    pub probabilities: ClassProbabilities,
}

impl ClassPrediction {
    /// Pick the winning class from a distribution.
    ///
    /// Returns `None` if the distribution is empty.
    #[must_use]
    pub fn from_probabilities(probabilities: ClassProbabilities) -> Option<Self> {
        let (class_code, _) = probabilities.best()?;
        Some(Self {
            class_code,
            probabilities,
        })
    }

    /// Probability mass of the winning class.
    #[must_use]
    pub fn top_probability(&self) -> f64 {
        self.probabilities.get(self.class_code)
    }
}

/// Decoded prediction, as returned at the serving boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Outcome label from the outcome vocabulary
    pub predicted_outcome: String,

    /// Winning class probability as a percentage, rounded to two decimals
    pub confidence: f64,
}

impl Prediction {
    #[must_use]
    pub fn new(predicted_outcome: impl Into<String>, top_probability: f64) -> Self {
        Self {
            predicted_outcome: predicted_outcome.into(),
            confidence: confidence_percent(top_probability),
        }
    }
}

/// Express a probability as a percentage rounded to two decimals, clamped to `[0, 100]`.
///
/// Rounds the exact binary value once, halves to even.
#[must_use]
pub fn confidence_percent(probability: f64) -> f64 {
    if !probability.is_finite() {
        return 0.0;
    }
    format!("{:.2}", probability * 100.0)
        .parse::<f64>()
        .map_or(0.0, |percent| percent.clamp(0.0, 100.0))
}
