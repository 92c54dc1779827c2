//! In-memory tabular model shared by all ETL stages.
//!
//! A `RawTable` is what the file readers hand to the engine: an ordered
//! column list plus rows in source order. All engine stages work on this
//! shape; none of them touch files or SQL.

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical textual form, used for dimension membership, join keys
    /// and name→key lookups. `Int(1)`, `Float(1.0)` and `Text("1")` all
    /// agree on `"1"`, so the same game id matches across a typed XLSX
    /// export and an all-text CSV export. `Null` has no textual form.
    pub fn text_form(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            // f64 Display renders integral floats without a fraction.
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Ordered columns + rows, preserving source ordering.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        RawTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with nulls (ragged spreadsheet
    /// rows are common) and truncating overlong ones.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (row, column name); `Null` when the column does not exist.
    pub fn cell<'a>(&'a self, row: &'a [Value], column: &str) -> &'a Value {
        self.column_index(column)
            .and_then(|idx| row.get(idx))
            .unwrap_or(&Value::Null)
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Vec<&Value> {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().map(|r| &r[idx]).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_agrees_across_encodings() {
        assert_eq!(Value::Int(42).text_form().unwrap(), "42");
        assert_eq!(Value::Float(42.0).text_form().unwrap(), "42");
        assert_eq!(Value::Text("42".into()).text_form().unwrap(), "42");
        assert_eq!(Value::Float(1.5).text_form().unwrap(), "1.5");
        assert_eq!(Value::Null.text_form(), None);
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(Value::Text(" 10 ".into()).as_i64(), Some(10));
        assert_eq!(Value::Float(10.0).as_i64(), Some(10));
        assert_eq!(Value::Float(10.5).as_i64(), None);
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let mut t = RawTable::new(vec!["a".into(), "b".into(), "c".into()]);
        t.push_row(vec![Value::Int(1)]);
        assert_eq!(t.rows()[0], vec![Value::Int(1), Value::Null, Value::Null]);
    }

    #[test]
    fn cell_lookup_by_column_name() {
        let mut t = RawTable::new(vec!["a".into(), "b".into()]);
        t.push_row(vec![Value::Int(1), Value::Text("x".into())]);
        let row = &t.rows()[0];
        assert_eq!(t.cell(row, "b"), &Value::Text("x".into()));
        assert_eq!(t.cell(row, "missing"), &Value::Null);
    }
}
