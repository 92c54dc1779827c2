//! Column resolver: binds semantic roles to concrete column names.
//!
//! Each role declares an ordered candidate keyword list up front; the
//! resolver is run once per table at pipeline start and the resulting
//! binding struct is carried through the run, never re-matched per row.

use crate::error::EtlError;

/// Declared role → ordered candidate keyword table entry.
#[derive(Debug, Clone, Copy)]
pub struct RoleSpec {
    pub role: &'static str,
    pub keywords: &'static [&'static str],
}

/// First column (in the table's original column order) whose name
/// contains any candidate keyword. Matching is a case-sensitive
/// substring test; export headers are not normalized.
pub fn resolve_column(columns: &[String], spec: &RoleSpec) -> Result<String, EtlError> {
    for column in columns {
        if spec.keywords.iter().any(|kw| column.contains(kw)) {
            return Ok(column.clone());
        }
    }
    Err(EtlError::UnresolvedRole {
        role: spec.role,
        keywords: spec.keywords.iter().map(|s| s.to_string()).collect(),
        columns: columns.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: RoleSpec = RoleSpec {
        role: "region",
        keywords: &["지역"],
    };

    const PERIOD: RoleSpec = RoleSpec {
        role: "period",
        keywords: &["기간", "동향"],
    };

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn substring_match_binds_first_column_in_table_order() {
        let columns = cols(&["게시글 제목", "동향 확인 기간", "조사 기간"]);
        // Both keyword candidates hit; table order wins, not keyword order.
        assert_eq!(resolve_column(&columns, &PERIOD).unwrap(), "동향 확인 기간");
    }

    #[test]
    fn match_is_case_sensitive() {
        let spec = RoleSpec {
            role: "link",
            keywords: &["url"],
        };
        let columns = cols(&["URL"]);
        assert!(resolve_column(&columns, &spec).is_err());
    }

    #[test]
    fn no_match_is_fatal() {
        let columns = cols(&["제목", "링크"]);
        let err = resolve_column(&columns, &REGION).unwrap_err();
        assert!(matches!(err, EtlError::UnresolvedRole { role: "region", .. }));
    }
}
