//! Value sanitizer applied before a reading reaches an instrument

use serde::{Deserialize, Serialize};

/// Closed range a reading is bounded to before display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampRange {
    pub min: f64,
    pub max: f64,
}

impl ClampRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn apply(&self, value: f64) -> f64 {
        clamp(value, self.min, self.max)
    }
}

/// Bound `value` to `[min, max]`.
///
/// The lower bound is applied first, then the upper bound, so `min > max`
/// yields `max`. A NaN value is returned as is.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return value;
    }
    value.max(min).min(max)
}
