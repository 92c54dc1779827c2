//! Bridge builder: expands a delimited multi-value column into
//! many-to-many edges against an existing dimension.

use std::collections::{BTreeSet, HashSet};

use crate::dimension::DimensionTable;
use crate::error::EtlError;
use crate::table::{RawTable, Value};

/// Default token delimiter of multi-value export columns.
pub const DEFAULT_DELIMITER: char = ';';

/// Split a multi-value cell into trimmed, non-empty tokens. A null cell
/// yields no tokens.
pub fn split_tokens(cell: &Value, delimiter: char) -> Vec<String> {
    match cell.text_form() {
        Some(text) => text
            .split(delimiter)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// The flattened distinct token set of a multi-value column; this is
/// the exact value set the target dimension must be built from.
pub fn distinct_tokens(table: &RawTable, column: &str, delimiter: char) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for cell in table.column_values(column) {
        tokens.extend(split_tokens(cell, delimiter));
    }
    tokens
}

/// Emit one `(primary_key, dimension_key)` edge per distinct pair.
///
/// Tokens are matched case-sensitively after trimming. A token missing
/// from the dimension is fatal: the dimension was built from a
/// different or stale value set, which is a programming-contract
/// violation rather than bad input data. Rows with a null primary key
/// or a null multi-value cell contribute no edges.
pub fn build_bridge(
    table: &RawTable,
    key_column: &str,
    multi_column: &str,
    delimiter: char,
    dimension: &DimensionTable,
) -> Result<Vec<(i64, i64)>, EtlError> {
    let mut edges = Vec::new();
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    for row in table.rows() {
        let Some(primary_key) = table.cell(row, key_column).as_i64() else {
            continue;
        };
        for token in split_tokens(table.cell(row, multi_column), delimiter) {
            let dimension_key = dimension.key_of(&token).ok_or_else(|| {
                EtlError::UnknownDimensionValue {
                    table: dimension.table(),
                    value: token.clone(),
                }
            })?;
            if seen.insert((primary_key, dimension_key)) {
                edges.push((primary_key, dimension_key));
            }
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genre_table(rows: Vec<(i64, Value)>) -> RawTable {
        let mut t = RawTable::new(vec!["appid".into(), "genres".into()]);
        for (id, genres) in rows {
            t.push_row(vec![Value::Int(id), genres]);
        }
        t
    }

    fn genre_dim(table: &RawTable) -> DimensionTable {
        DimensionTable::from_distinct(
            "dim_genre",
            distinct_tokens(table, "genres", DEFAULT_DELIMITER),
        )
    }

    #[test]
    fn tokens_are_trimmed_and_empties_dropped() {
        let cell = Value::Text(" Action ;; Indie ;".into());
        assert_eq!(split_tokens(&cell, ';'), vec!["Action", "Indie"]);
        assert!(split_tokens(&Value::Null, ';').is_empty());
    }

    #[test]
    fn duplicate_tokens_in_one_cell_yield_one_edge() {
        let t = genre_table(vec![(10, Value::Text("Action; Indie;Action".into()))]);
        let dim = genre_dim(&t);
        let edges = build_bridge(&t, "appid", "genres", ';', &dim).unwrap();
        assert_eq!(
            edges,
            vec![
                (10, dim.key_of("Action").unwrap()),
                (10, dim.key_of("Indie").unwrap())
            ]
        );
    }

    #[test]
    fn null_multi_value_cell_contributes_no_edges() {
        let t = genre_table(vec![
            (10, Value::Null),
            (11, Value::Text("Indie".into())),
        ]);
        let dim = genre_dim(&t);
        let edges = build_bridge(&t, "appid", "genres", ';', &dim).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, 11);
    }

    #[test]
    fn no_duplicate_pairs_across_the_table() {
        let t = genre_table(vec![
            (10, Value::Text("Action".into())),
            (10, Value::Text("Action; Indie".into())),
        ]);
        let dim = genre_dim(&t);
        let edges = build_bridge(&t, "appid", "genres", ';', &dim).unwrap();
        let distinct: HashSet<_> = edges.iter().collect();
        assert_eq!(distinct.len(), edges.len());
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn token_missing_from_dimension_is_fatal() {
        let t = genre_table(vec![(10, Value::Text("Action; RPG".into()))]);
        let stale = DimensionTable::from_distinct(
            "dim_genre",
            ["Action".to_string()].into_iter().collect(),
        );
        let err = build_bridge(&t, "appid", "genres", ';', &stale).unwrap_err();
        assert!(matches!(
            err,
            EtlError::UnknownDimensionValue { table: "dim_genre", .. }
        ));
    }
}
