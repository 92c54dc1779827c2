//! Dataset merger: inner join of two raw tables on a natural key.
//!
//! Only keys present in both sources survive; entities with incomplete
//! information are silently dropped, which is the intended semantic
//! ("describe only entities both sources know about"). Non-key columns
//! whose names collide across the sources are disambiguated with a
//! `_<tag>` suffix on both sides.

use std::collections::{HashMap, HashSet};

use crate::error::EtlError;
use crate::table::{RawTable, Value};

/// Inner-join `left` and `right` on their natural key columns.
///
/// The merged table keeps the left key column name, then left non-key
/// columns, then right non-key columns; row order follows `left`. Keys
/// are matched on textual form, so a typed and an all-text export of
/// the same id agree. Null keys never match. Natural keys are assumed
/// unique per source; with duplicates on the right, the first row per
/// key wins.
///
/// An empty intersection is fatal: every downstream dimension and fact
/// derivation builds on the merged set.
fn missing_key(key: &str, table: &RawTable) -> EtlError {
    EtlError::UnresolvedRole {
        role: "natural_key",
        keywords: vec![key.to_string()],
        columns: table.columns().to_vec(),
    }
}

pub fn merge_inner(
    left: &RawTable,
    left_key: &str,
    right: &RawTable,
    right_key: &str,
    left_tag: &str,
    right_tag: &str,
) -> Result<RawTable, EtlError> {
    let left_key_idx = left.column_index(left_key).ok_or_else(|| missing_key(left_key, left))?;
    let right_key_idx = right
        .column_index(right_key)
        .ok_or_else(|| missing_key(right_key, right))?;

    let left_names: Vec<&String> = left
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != left_key_idx)
        .map(|(_, n)| n)
        .collect();
    let right_names: HashSet<&String> = right
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != right_key_idx)
        .map(|(_, n)| n)
        .collect();
    let collisions: HashSet<&String> = left_names
        .iter()
        .copied()
        .filter(|n| right_names.contains(*n))
        .collect();

    let mut columns = vec![left_key.to_string()];
    for (i, name) in left.columns().iter().enumerate() {
        if i == left_key_idx {
            continue;
        }
        if collisions.contains(name) {
            columns.push(format!("{name}_{left_tag}"));
        } else {
            columns.push(name.clone());
        }
    }
    for (i, name) in right.columns().iter().enumerate() {
        if i == right_key_idx {
            continue;
        }
        if collisions.contains(name) {
            columns.push(format!("{name}_{right_tag}"));
        } else {
            columns.push(name.clone());
        }
    }

    let mut right_by_key: HashMap<String, &Vec<Value>> = HashMap::new();
    for row in right.rows() {
        if let Some(key) = row[right_key_idx].text_form() {
            right_by_key.entry(key).or_insert(row);
        }
    }

    let mut merged = RawTable::new(columns);
    for row in left.rows() {
        let key = match row[left_key_idx].text_form() {
            Some(k) => k,
            None => continue,
        };
        let Some(other) = right_by_key.get(&key) else {
            continue;
        };
        let mut out = Vec::with_capacity(left.columns().len() + right.columns().len() - 1);
        out.push(row[left_key_idx].clone());
        for (i, value) in row.iter().enumerate() {
            if i != left_key_idx {
                out.push(value.clone());
            }
        }
        for (i, value) in other.iter().enumerate() {
            if i != right_key_idx {
                out.push(value.clone());
            }
        }
        merged.push_row(out);
    }

    if merged.is_empty() {
        return Err(EtlError::EmptyJoinResult {
            key: left_key.to_string(),
            left_rows: left.row_count(),
            right_rows: right.row_count(),
        });
    }
    Ok(merged)
}
