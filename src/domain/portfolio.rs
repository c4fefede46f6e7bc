//! Target portfolio weights.

use crate::domain::error::QuantrankError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Allowed distance of the weight total from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Instrument code → weight, ordered by code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Portfolio {
    weights: BTreeMap<String, f64>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            weights: weights.into_iter().map(|(k, w)| (k.into(), w)).collect(),
        }
    }

    /// Equal weights across `codes`. Duplicate codes collapse.
    pub fn equal_weight<S: AsRef<str>>(codes: &[S]) -> Self {
        let unique: std::collections::BTreeSet<&str> = codes.iter().map(|c| c.as_ref()).collect();
        if unique.is_empty() {
            return Self::default();
        }
        let w = 1.0 / unique.len() as f64;
        Self::from_weights(unique.into_iter().map(|c| (c, w)))
    }

    pub fn insert(&mut self, code: impl Into<String>, weight: f64) {
        self.weights.insert(code.into(), weight);
    }

    pub fn weight(&self, code: &str) -> Option<f64> {
        self.weights.get(code).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, &w)| (k.as_str(), w))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Check that the portfolio is non-empty, every weight is finite and
    /// strictly positive, and the weights sum to 1 within tolerance.
    pub fn validate(&self) -> Result<(), QuantrankError> {
        if self.weights.is_empty() {
            return Err(QuantrankError::InvalidPortfolio {
                reason: "no holdings".into(),
            });
        }
        for (code, &w) in &self.weights {
            if !w.is_finite() || w <= 0.0 {
                return Err(QuantrankError::InvalidPortfolio {
                    reason: format!("weight for {} must be positive, got {}", code, w),
                });
            }
        }
        let total = self.total_weight();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(QuantrankError::InvalidPortfolio {
                reason: format!("weights sum to {:.4}, expected 1.0", total),
            });
        }
        Ok(())
    }
}
