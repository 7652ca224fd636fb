use chrono::{DateTime, Utc};
use ordered_float::NotNan;

use crate::Normalized;

const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Weight applied to a candidate that was recently selected. Immediately after a selection the
/// weight drops to `min_weight`, then recovers linearly to 1 over `recovery_window_days`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecoveryCurve {
    min_weight: Normalized,
    recovery_window_days: NotNan<f64>,
}

impl RecoveryCurve {
    /// Returns `None` unless `min_weight > 0` and `recovery_window_days` is finite and positive.
    pub fn new(min_weight: Normalized, recovery_window_days: f64) -> Option<Self> {
        if min_weight.is_zero() {
            return None;
        }
        let recovery_window_days = NotNan::new(recovery_window_days).ok()?;
        if !recovery_window_days.is_finite() || *recovery_window_days <= 0.0 {
            return None;
        }
        Some(Self {
            min_weight,
            recovery_window_days,
        })
    }

    pub fn min_weight(&self) -> Normalized {
        self.min_weight
    }

    pub fn recovery_window_days(&self) -> f64 {
        *self.recovery_window_days
    }

    /// Score a candidate last selected `days_since_selection` days ago.
    pub fn weight(&self, days_since_selection: f64) -> Normalized {
        let min = self.min_weight.as_f64();
        // `f64::max` maps NaN to 0, so NaN counts as "just selected".
        let recovered = days_since_selection.max(0.0) / *self.recovery_window_days;
        if recovered >= 1.0 {
            return Normalized::ONE;
        }
        Normalized::clamp(
            min + ((1.0 - min) * recovered),
            self.min_weight,
            Normalized::ONE,
        )
        .unwrap_or(self.min_weight)
    }

    pub fn days_until_full_weight(&self, days_since_selection: f64) -> f64 {
        (*self.recovery_window_days - days_since_selection.max(0.0)).max(0.0)
    }
}

/// Fractional days elapsed from `then` to `now`. Negative when `then` lies in the future.
pub fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / MILLIS_PER_DAY
}
