//! End-of-run summary: rows processed, per-role unmapped counts, and
//! the tables written with their write modes. Serializable so the
//! services can emit it as JSON.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::output::TableWrite;

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub rows_processed: usize,
    /// Role → number of rows whose value fell back to the null sentinel.
    pub unmapped: BTreeMap<String, usize>,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub mode: String,
    pub rows: usize,
}

impl RunReport {
    pub fn record_unmapped(&mut self, role: &'static str) {
        *self.unmapped.entry(role.to_string()).or_insert(0) += 1;
    }

    pub fn record_table(&mut self, write: &TableWrite) {
        self.tables.push(TableSummary {
            table: write.table.to_string(),
            mode: write.mode.label().to_string(),
            rows: write.row_count(),
        });
    }

    pub fn total_unmapped(&self) -> usize {
        self.unmapped.values().sum()
    }
}
