use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

/// A non-NaN f64 value in the range [0, 1].
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Normalized(NotNan<f64>);

impl Normalized {
    pub const ZERO: Self = Self(unsafe { NotNan::new_unchecked(0.0) });
    pub const ONE: Self = Self(unsafe { NotNan::new_unchecked(1.0) });

    pub fn new(value: f64) -> Option<Self> {
        let value = NotNan::new(value).ok()?;
        if value.is_sign_negative() || *value > 1.0 {
            return None;
        }
        Some(Self(value))
    }

    /// Clamp `value` into `[min, max]` before normalizing. Returns `None` for NaN or bounds outside
    /// of [0, 1].
    pub fn clamp(value: f64, min: Normalized, max: Normalized) -> Option<Self> {
        if value.is_nan() || min > max {
            return None;
        }
        Self::new(value.clamp(min.as_f64(), max.as_f64()))
    }

    pub fn as_f64(&self) -> f64 {
        self.0.into_inner()
    }

    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }
}

impl TryFrom<f64> for Normalized {
    type Error = OutOfRange;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(OutOfRange(value))
    }
}

impl From<Normalized> for f64 {
    fn from(value: Normalized) -> Self {
        value.as_f64()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[error("{0} is not within [0, 1]")]
pub struct OutOfRange(pub f64);

impl std::cmp::PartialOrd for Normalized {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::cmp::Ord for Normalized {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Debug for Normalized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for Normalized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match f.precision() {
            Some(precision) => write!(f, "{:.*}", precision, self.as_f64()),
            None => write!(f, "{}", self.as_f64()),
        }
    }
}

#[track_caller]
pub fn assert_within(value: f64, expected: f64, tolerance: f64) {
    let diff = (value - expected).abs();
    assert!(
        diff <= tolerance,
        "Expected value of {expected} +- {tolerance} but got {value} which is off by {diff}",
    );
}
