use decision_engine::{criteria::recency::RecoveryCurve, Normalized};
use serde::{Deserialize, Serialize};

use crate::DecisionError;

/// Tuning for weighted random selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Weight of a restaurant right after it was selected. Must be in (0, 1] so that recent picks
    /// are never excluded outright.
    pub min_weight: f64,
    /// Days for a selected restaurant to recover to full weight.
    pub recovery_window_days: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.1,
            recovery_window_days: 30.0,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), DecisionError> {
        self.recovery_curve().map(|_| ())
    }

    pub fn recovery_curve(&self) -> Result<RecoveryCurve, DecisionError> {
        let min_weight = Normalized::new(self.min_weight)
            .filter(|w| !w.is_zero())
            .ok_or_else(|| {
                DecisionError::InvalidConfig(format!(
                    "min_weight must be in (0, 1], got {}",
                    self.min_weight
                ))
            })?;
        RecoveryCurve::new(min_weight, self.recovery_window_days).ok_or_else(|| {
            DecisionError::InvalidConfig(format!(
                "recovery_window_days must be positive, got {}",
                self.recovery_window_days
            ))
        })
    }
}
