//! Engine output: fully materialized tables handed to the persistence
//! layer as opaque write requests. The engine decides names, column
//! order and write mode; the store decides how to execute them.

use crate::table::Value;

/// How the store must apply a table write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Discard any prior table of the same name, then write.
    Replace,
    /// Insert into a pre-seeded schema, keeping existing rows.
    Append,
}

impl WriteMode {
    pub fn label(self) -> &'static str {
        match self {
            WriteMode::Replace => "replace",
            WriteMode::Append => "append",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColType {
    Integer,
    Real,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColType) -> Self {
        Column { name, ty }
    }
}

/// One named output table with a fixed column order.
#[derive(Debug, Clone)]
pub struct TableWrite {
    pub table: &'static str,
    pub mode: WriteMode,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl TableWrite {
    pub fn new(table: &'static str, mode: WriteMode, columns: Vec<Column>) -> Self {
        TableWrite {
            table,
            mode,
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
