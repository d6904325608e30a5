use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a value sits relative to the middle half of its variable's distribution.
/// `AboveAverage` always means the favorable side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AverageLabel {
    #[serde(rename = "Below Average")]
    BelowAverage,
    #[serde(rename = "Average")]
    Average,
    #[serde(rename = "Above Average")]
    AboveAverage,
}

impl AverageLabel {
    /// Classify `value` against the `[lower, upper]` band (inclusive).
    /// For inverted variables a low value is favorable.
    pub fn classify(value: f64, lower: f64, upper: f64, inverted: bool) -> Self {
        if lower <= value && value <= upper {
            AverageLabel::Average
        } else if (value < lower) != inverted {
            AverageLabel::BelowAverage
        } else {
            AverageLabel::AboveAverage
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            AverageLabel::BelowAverage => "Below Average",
            AverageLabel::Average => "Average",
            AverageLabel::AboveAverage => "Above Average",
        }
    }
}

impl fmt::Display for AverageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Percentile `q` in `[0, 1]` of ascending-sorted values, interpolating linearly
/// between the two nearest order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() { return None }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (position - lo as f64))
}
