//! Dimension builder: deduplicated lookup tables with deterministic
//! surrogate keys.
//!
//! Keys are assigned by position in the byte-wise lexicographic sort of
//! the distinct textual forms, 1-based. Downstream fact rows reference
//! these keys by value, so a rebuild on identical input must assign
//! identical keys.

use std::collections::{BTreeSet, HashMap};

use crate::error::EtlError;
use crate::output::{ColType, Column, TableWrite, WriteMode};
use crate::table::{RawTable, Value};

/// Surrogate key of the fixed positive sentiment row.
pub const SENTIMENT_POSITIVE: i64 = 0;
/// Surrogate key of the fixed negative sentiment row.
pub const SENTIMENT_NEGATIVE: i64 = 1;

pub const SENTIMENT_POSITIVE_LABEL: &str = "긍정";
pub const SENTIMENT_NEGATIVE_LABEL: &str = "부정";

#[derive(Debug, Clone)]
pub struct DimensionTable {
    table: &'static str,
    rows: Vec<(i64, String)>,
    index: HashMap<String, i64>,
}

impl DimensionTable {
    /// Build from one bound column of a raw table.
    ///
    /// Null cells are dropped when `allow_null` is set; otherwise any
    /// null is fatal (`InvalidDimensionValue`).
    pub fn build(
        source: &RawTable,
        column: &str,
        table: &'static str,
        allow_null: bool,
    ) -> Result<Self, EtlError> {
        let mut distinct = BTreeSet::new();
        for value in source.column_values(column) {
            match value.text_form() {
                Some(text) => {
                    distinct.insert(text);
                }
                None if allow_null => {}
                None => {
                    return Err(EtlError::InvalidDimensionValue {
                        table,
                        column: column.to_string(),
                    })
                }
            }
        }
        Ok(Self::from_distinct(table, distinct))
    }

    /// Build from an already-flattened distinct value set (used for the
    /// genre dimension, whose members come from multi-value tokens
    /// rather than whole cells).
    pub fn from_distinct(table: &'static str, distinct: BTreeSet<String>) -> Self {
        let rows: Vec<(i64, String)> = distinct
            .into_iter()
            .enumerate()
            .map(|(pos, name)| (pos as i64 + 1, name))
            .collect();
        let index = rows.iter().map(|(k, n)| (n.clone(), *k)).collect();
        DimensionTable { table, rows, index }
    }

    /// The fixed two-row sentiment enumeration. Deliberately bypasses
    /// the derived build: this is a hardcoded boolean-like domain, and
    /// its keys are 0-based unlike every derived dimension.
    pub fn sentiment() -> Self {
        let rows = vec![
            (SENTIMENT_POSITIVE, SENTIMENT_POSITIVE_LABEL.to_string()),
            (SENTIMENT_NEGATIVE, SENTIMENT_NEGATIVE_LABEL.to_string()),
        ];
        let index = rows.iter().map(|(k, n)| (n.clone(), *k)).collect();
        DimensionTable {
            table: "d_sentiment",
            rows,
            index,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn rows(&self) -> &[(i64, String)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn key_of(&self, name: &str) -> Option<i64> {
        self.index.get(name).copied()
    }

    /// Materialize as `{id_column, name_column}` rows in key order.
    pub fn to_write(
        &self,
        id_column: &'static str,
        name_column: &'static str,
        mode: WriteMode,
    ) -> TableWrite {
        let mut write = TableWrite::new(
            self.table,
            mode,
            vec![
                Column::new(id_column, ColType::Integer),
                Column::new(name_column, ColType::Text),
            ],
        );
        for (key, name) in &self.rows {
            write
                .rows
                .push(vec![Value::Int(*key), Value::Text(name.clone())]);
        }
        write
    }
}
