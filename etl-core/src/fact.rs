//! Fact-building primitives shared by the pipelines: foreign-key
//! lookup with the unmapped sentinel, sentiment normalization, the
//! zero-division-safe ratio, and the correlation key.

use crate::dimension::{DimensionTable, SENTIMENT_NEGATIVE, SENTIMENT_POSITIVE};
use crate::report::RunReport;
use crate::table::Value;

/// 1-based row sequence number reused as both the fact surrogate id and
/// the foreign reference into the parallel detail table (`raw_post`).
/// The reuse is a documented simplification of the survey schema; both
/// readings go through this type so a future schema change can separate
/// them without touching call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationKey(i64);

impl CorrelationKey {
    pub fn from_row_index(index: usize) -> Self {
        CorrelationKey(index as i64 + 1)
    }

    /// Surrogate id of the fact row.
    pub fn fact_id(self) -> i64 {
        self.0
    }

    /// Reference into the parallel detail table.
    pub fn detail_id(self) -> i64 {
        self.0
    }
}

/// Resolve a raw categorical value against a dimension. A miss (or a
/// null raw value) yields the null sentinel and bumps the per-role
/// unmapped counter; a single malformed record must not abort the
/// batch.
pub fn foreign_key(
    dimension: &DimensionTable,
    value: &Value,
    role: &'static str,
    report: &mut RunReport,
) -> Value {
    let key = value.text_form().and_then(|text| dimension.key_of(&text));
    match key {
        Some(k) => Value::Int(k),
        None => {
            report.record_unmapped(role);
            Value::Null
        }
    }
}

/// Normalize the binary sentiment encodings seen in the wild — numeric
/// 0/1, booleans, or the two fixed labels — to the fixed surrogate
/// keys. Anything else is unmappable.
pub fn sentiment_key(value: &Value) -> Option<i64> {
    match value {
        Value::Int(0) | Value::Bool(false) => Some(SENTIMENT_POSITIVE),
        Value::Int(1) | Value::Bool(true) => Some(SENTIMENT_NEGATIVE),
        Value::Float(f) if *f == 0.0 => Some(SENTIMENT_POSITIVE),
        Value::Float(f) if *f == 1.0 => Some(SENTIMENT_NEGATIVE),
        Value::Text(s) if s == crate::dimension::SENTIMENT_POSITIVE_LABEL => {
            Some(SENTIMENT_POSITIVE)
        }
        Value::Text(s) if s == crate::dimension::SENTIMENT_NEGATIVE_LABEL => {
            Some(SENTIMENT_NEGATIVE)
        }
        _ => None,
    }
}

/// Ratio with the zero-division guard: a zero denominator is
/// substituted with 1, so 0 positive / 0 total yields 0.0 rather than
/// an error or NaN.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        numerator / 1.0
    } else {
        numerator / denominator
    }
}
