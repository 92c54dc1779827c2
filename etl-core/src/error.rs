//! Structural error taxonomy. Everything here aborts the run; per-row
//! classification misses are not errors and are absorbed into the
//! [`RunReport`](crate::report::RunReport) instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    /// A required semantic column could not be located. Fatal: every
    /// downstream stage depends on the binding being correct.
    #[error("no column matches role '{role}' (keywords {keywords:?}, columns {columns:?})")]
    UnresolvedRole {
        role: &'static str,
        keywords: Vec<String>,
        columns: Vec<String>,
    },

    /// A dimension source column contained nulls and the build did not
    /// allow them.
    #[error("dimension '{table}' source column '{column}' contains null values")]
    InvalidDimensionValue {
        table: &'static str,
        column: String,
    },

    /// Inner join produced nothing to build on.
    #[error("join on '{key}' matched no rows ({left_rows} left, {right_rows} right)")]
    EmptyJoinResult {
        key: String,
        left_rows: usize,
        right_rows: usize,
    },

    /// A multi-value token was not found in the dimension it must have
    /// been built from. Contract violation between builder stages, not
    /// a data-quality condition.
    #[error("value '{value}' is not in dimension '{table}'")]
    UnknownDimensionValue {
        table: &'static str,
        value: String,
    },
}
