//! Derived campaign ratios. Every ratio is zero when its denominator is not
//! positive, so payloads never carry NaN or infinity.

use rusqlite::types::Value as SqlValue;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Aggregate value read back from SQLite: sums of integer gauges stay
/// integral, averages and currency sums are real.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Real(f64),
}

impl MetricValue {
    pub const ZERO: Self = Self::Integer(0);

    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Real(value) => value,
        }
    }

    #[must_use]
    pub fn from_sql(value: SqlValue) -> Self {
        match value {
            SqlValue::Integer(value) => Self::Integer(value),
            SqlValue::Real(value) if value.is_finite() => Self::Real(value),
            SqlValue::Real(_) | SqlValue::Null | SqlValue::Text(_) | SqlValue::Blob(_) => {
                Self::ZERO
            }
        }
    }
}

impl Default for MetricValue {
    fn default() -> Self {
        Self::ZERO
    }
}

#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        let value = numerator / denominator;
        if value.is_finite() { value } else { 0.0 }
    } else {
        0.0
    }
}

#[must_use]
pub fn percent(numerator: f64, denominator: f64) -> f64 {
    ratio(numerator, denominator) * 100.0
}

/// Clicks per impression, in percent.
#[must_use]
pub fn click_through_rate(clicks: i64, impressions: i64) -> f64 {
    percent(clicks as f64, impressions as f64)
}

/// Cost per thousand impressions.
#[must_use]
pub fn cost_per_mille(spend: f64, impressions: i64) -> f64 {
    ratio(spend, impressions as f64) * 1_000.0
}

#[must_use]
pub fn cost_per_acquisition(spend: f64, conversions: i64) -> f64 {
    ratio(spend, conversions as f64)
}

#[must_use]
pub fn conversion_rate(conversions: i64, clicks: i64) -> f64 {
    percent(conversions as f64, clicks as f64)
}

/// `(roas - 1) * 100`, or -100 when no return was recorded.
#[must_use]
pub fn roi_percentage(roas: f64) -> f64 {
    if roas > 0.0 { (roas - 1.0) * 100.0 } else { -100.0 }
}
